use leptos::prelude::*;

#[component]
pub fn Home() -> impl IntoView {
    view! {
        <div>
            <h1>"Home"</h1>
            <p>"Welcome to minihub dashboard"</p>
        </div>
    }
}
