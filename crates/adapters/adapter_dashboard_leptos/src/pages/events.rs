use leptos::prelude::*;

#[component]
pub fn Events() -> impl IntoView {
    view! {
        <div>
            <h1>"Events"</h1>
            <p>"Event log will appear here"</p>
        </div>
    }
}
