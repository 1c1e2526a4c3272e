#![allow(dead_code)]

use std::sync::Arc;

use odata_query::{
    ElementType, Entity, FieldKind, FieldValue, QueryOptions, RawQueryParams, Record,
    TypeRegistry, ValidationErrors,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Department {
    pub code: String,
    pub title: String,
}

impl Record for Department {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "code" => FieldValue::value(&self.code),
            "title" => FieldValue::value(&self.title),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub department: String,
    pub manager: Option<Box<Person>>,
    pub unit: Option<Department>,
    pub reports: Vec<Person>,
}

impl Record for Person {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "id" => FieldValue::value(self.id),
            "name" => FieldValue::value(&self.name),
            "age" => FieldValue::value(self.age),
            "department" => FieldValue::value(&self.department),
            "manager" => FieldValue::one(self.manager.as_deref()),
            "unit" => FieldValue::one(self.unit.as_ref()),
            "reports" => FieldValue::many(&self.reports),
            _ => return None,
        })
    }
}

impl Entity for Person {
    const TYPE_NAME: &'static str = "Person";
}

pub fn registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::builder()
        .element_type(
            ElementType::builder("Person")
                .field("id", FieldKind::I64)
                .field("name", FieldKind::String)
                .nullable_field("age", FieldKind::I64)
                .field("department", FieldKind::String)
                .navigation("manager", "Person")
                .navigation("unit", "Department")
                .collection("reports", "Person"),
        )
        .element_type(
            ElementType::builder("Department")
                .field("code", FieldKind::String)
                .field("title", FieldKind::String),
        )
        .build()
        .unwrap();
    Arc::new(registry)
}

pub fn person(id: i64, name: &str, age: Option<i64>, department: &str) -> Person {
    Person {
        id,
        name: name.to_owned(),
        age,
        department: department.to_owned(),
        manager: None,
        unit: None,
        reports: Vec::new(),
    }
}

/// Ann(40, Eng), Bo(25, Eng), Cid(50, Eng)
pub fn people() -> Vec<Person> {
    vec![
        person(1, "Ann", Some(40), "Eng"),
        person(2, "Bo", Some(25), "Eng"),
        person(3, "Cid", Some(50), "Eng"),
    ]
}

pub fn names(items: &[Person]) -> Vec<&str> {
    items.iter().map(|p| p.name.as_str()).collect()
}

/// Build and initialize an option set from a query string.
pub fn options(query: &str) -> (QueryOptions<Person>, ValidationErrors) {
    let params = RawQueryParams::from_query_string(query).unwrap();
    let mut options = QueryOptions::<Person>::new(registry()).unwrap();
    let mut errors = ValidationErrors::new();
    options.initialize(&params, &mut errors);
    (options, errors)
}
