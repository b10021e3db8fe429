use leptos::prelude::*;

#[component]
pub fn Devices() -> impl IntoView {
    view! {
        <div>
            <h1>"Devices"</h1>
            <p>"Device list will appear here"</p>
        </div>
    }
}
