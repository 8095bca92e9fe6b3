use serde_json::json;
use sqlito_schema::ToolSpec;

pub const LIST_TABLES: &str = "list_tables";
pub const EXECUTE_SQL: &str = "execute_sql";

/// The two tools every chat run is allowed to use.
pub fn fixed_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: LIST_TABLES.to_string(),
            description: "Lists all tables in one or more schemas of the project database."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "project_id": {
                        "type": "string",
                        "description": "The project reference ID."
                    },
                    "schema": {
                        "type": "string",
                        "description": "Schema to list tables from.",
                        "default": "public"
                    }
                },
                "required": ["project_id"]
            }),
        },
        ToolSpec {
            name: EXECUTE_SQL.to_string(),
            description: "Executes a read-only SQL query against the project database and returns the rows."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "project_id": {
                        "type": "string",
                        "description": "The project reference ID."
                    },
                    "query": {
                        "type": "string",
                        "description": "The SQL query to execute."
                    }
                },
                "required": ["project_id", "query"]
            }),
        },
    ]
}
