#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use odata_query::{
    ElementType, Entity, FieldKind, FieldValue, QueryOptions, RawQueryParams, Record,
    TypeRegistry, ValidationErrors,
};

#[derive(serde::Serialize)]
struct Item {
    id: i64,
    children: Vec<Item>,
}

impl Record for Item {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "id" => Some(FieldValue::value(self.id)),
            "children" => Some(FieldValue::many(&self.children)),
            _ => None,
        }
    }
}

impl Entity for Item {
    const TYPE_NAME: &'static str = "Item";
}

fuzz_target!(|data: &[u8]| {
    // Limit input size to avoid OOM on pathological inputs
    if data.len() > 1024 {
        return;
    }
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(params) = RawQueryParams::from_query_string(s) else {
        return;
    };
    let registry = TypeRegistry::builder()
        .element_type(
            ElementType::builder("Item")
                .field("id", FieldKind::I64)
                .navigation("parent", "Item")
                .collection("children", "Item"),
        )
        .build()
        .unwrap();
    let mut options = QueryOptions::<Item>::new(Arc::new(registry)).unwrap();
    let mut errors = ValidationErrors::new();
    // All seven parameters, including nested $expand, must degrade to errors
    options.initialize(&params, &mut errors);
    let _ = errors.to_problem("/fuzz");
});
