use leptos::prelude::*;

#[component]
pub fn Entities() -> impl IntoView {
    view! {
        <div>
            <h1>"Entities"</h1>
            <p>"Entity list will appear here"</p>
        </div>
    }
}
