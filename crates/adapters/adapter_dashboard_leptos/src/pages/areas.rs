use leptos::prelude::*;

#[component]
pub fn Areas() -> impl IntoView {
    view! {
        <div>
            <h1>"Areas"</h1>
            <p>"Area list will appear here"</p>
        </div>
    }
}
