//! A counter component driven by dispatched click events.
//!
//! Run with `cargo run --example counter`. Renders into the in-memory
//! document and prints the serialized tree after each change.

use std::rc::Rc;

use sprig_ui::{h, App, Config, Props, Runtime, Value};

fn main() -> Result<(), sprig_ui::Error> {
    let runtime = Runtime::new();
    let container = runtime.document().borrow_mut().create_container("app");

    let counter = Rc::new(
        Config::new("counter")
            .data(Value::map([("count", Value::Int(0))]))
            .render(|c| {
                let count = c.get("count");
                h(
                    "div",
                    Props::new().class("counter"),
                    vec![
                        h(
                            "span",
                            Props::new().class("value"),
                            vec![count.to_string().into()],
                        ),
                        h(
                            "button",
                            Props::new().text("+1").on("click", {
                                let data = c.data();
                                move |_| {
                                    let n = data.get("count").as_int().unwrap_or(0);
                                    data.set("count", Value::Int(n + 1));
                                }
                            }),
                            vec![],
                        ),
                    ],
                )
            })
            .after_update(|c| {
                println!("updated: count = {}", c.get("count"));
            }),
    );

    let app = App::with_runtime(counter, runtime.clone());
    app.mount("#app")?;
    println!("{}", runtime.document().borrow().outer_html(container));

    // Simulate three clicks; each batch of writes costs one re-render.
    let root = app.root().and_then(|c| c.root_node());
    if let Some(root) = root {
        let button = runtime.document().borrow().children_of(root)[1];
        for _ in 0..3 {
            sprig_ui::Document::dispatch(&runtime.document(), button, "click", &[]);
            runtime.settle();
        }
    }
    println!("{}", runtime.document().borrow().outer_html(container));

    app.unmount();
    Ok(())
}
