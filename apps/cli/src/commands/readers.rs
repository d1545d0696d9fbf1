//! List the registered reader implementations.

use lector_models::default_registry;

pub fn execute() {
    for name in default_registry().names() {
        println!("{name}");
    }
}
