//! Static description of the supported query parameters, for API docs.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Integer,
    Boolean,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParameterDoc {
    pub name: &'static str,
    pub value_type: ParameterType,
    pub description: &'static str,
}

pub const QUERY_PARAMETERS: &[ParameterDoc] = &[
    ParameterDoc {
        name: "$select",
        value_type: ParameterType::String,
        description: "Comma-separated list of fields to return, or `*` for all fields.",
    },
    ParameterDoc {
        name: "$expand",
        value_type: ParameterType::String,
        description: "Comma-separated list of related entities to include, \
                      optionally with nested `($select=...;$expand=...)`.",
    },
    ParameterDoc {
        name: "$filter",
        value_type: ParameterType::String,
        description: "Boolean expression restricting the returned items, \
                      e.g. `age gt 30 and contains(name,'an')`.",
    },
    ParameterDoc {
        name: "$orderby",
        value_type: ParameterType::String,
        description: "Comma-separated sort keys, each `property [asc|desc]`.",
    },
    ParameterDoc {
        name: "$skip",
        value_type: ParameterType::Integer,
        description: "Number of matching items to skip.",
    },
    ParameterDoc {
        name: "$top",
        value_type: ParameterType::Integer,
        description: "Maximum number of items to return.",
    },
    ParameterDoc {
        name: "$count",
        value_type: ParameterType::Boolean,
        description: "Include the total number of matching items when `true`.",
    },
];
