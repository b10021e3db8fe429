use leptos::prelude::*;

#[component]
pub fn App() -> impl IntoView {
    view! {
        <div>
            <h1>"Hello minihub"</h1>
            <p>"Welcome to the minihub dashboard"</p>
        </div>
    }
}
