//! Observables, computed values, and watchers without any view layer.
//!
//! Run with `cargo run --example watchers`.

use sprig_ui::{Observable, Runtime, Value};

fn main() {
    let rt = Runtime::new();

    let user = rt.reactive(Value::map([
        ("name", Value::from("ada")),
        ("visits", Value::Int(0)),
    ]));
    let data = Observable::wrap(&rt, &user).expect("map wraps");

    // Lazily cached; recomputes only after a dependency write.
    let label = rt.computed({
        let rt = rt.clone();
        let user = user.clone();
        move || {
            let data = Observable::wrap(&rt, &user).expect("map wraps");
            format!("{} ({} visits)", data.get("name"), data.get("visits"))
        }
    });
    println!("label: {}", label.get());

    let watcher = rt.watch_path(user.clone(), "name", |old, new| {
        println!("name changed: {old} -> {new}");
    });

    data.set("name", Value::from("grace"));
    data.set("visits", Value::Int(1));
    rt.settle();
    println!("label: {}", label.get());

    // A write-and-revert inside one batch never fires the watcher.
    data.set("name", Value::from("temp"));
    data.set("name", Value::from("grace"));
    rt.settle();

    watcher.stop();
    data.set("name", Value::from("unseen"));
    rt.settle();
    println!("final label: {}", label.get());
}
