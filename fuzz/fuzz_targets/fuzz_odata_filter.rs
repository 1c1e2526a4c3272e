#![no_main]

use libfuzzer_sys::fuzz_target;
use odata_query::{ElementType, FieldKind, TypeRegistry, parse_filter};

fn registry() -> TypeRegistry {
    TypeRegistry::builder()
        .element_type(
            ElementType::builder("Item")
                .field("id", FieldKind::I64)
                .field("name", FieldKind::String)
                .nullable_field("price", FieldKind::Decimal)
                .nullable_field("created", FieldKind::DateTimeUtc)
                .field("active", FieldKind::Bool)
                .navigation("parent", "Item")
                .collection("children", "Item"),
        )
        .build()
        .unwrap()
}

fuzz_target!(|data: &[u8]| {
    // Limit input size to avoid OOM on pathological inputs
    if data.len() > 1024 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data) {
        let registry = registry();
        let item = registry.element_type("Item").unwrap();
        // Errors are expected; the parser must not panic or overflow the stack
        if let Ok(expr) = parse_filter(s, &registry, item) {
            let _ = expr.to_string();
        }
    }
});
