//! Static catalog of the tools an agent may be granted.
//!
//! The table is process-wide and read-only. Lookups by unknown id return `None`;
//! callers that validate workflow files drop such ids instead of failing.

use std::{collections::HashMap, fmt::Display, sync::LazyLock};

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    File,
    Search,
    System,
    Web,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 4] = [
        ToolCategory::File,
        ToolCategory::Search,
        ToolCategory::System,
        ToolCategory::Web,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::File => "file",
            ToolCategory::Search => "search",
            ToolCategory::System => "system",
            ToolCategory::Web => "web",
        }
    }
}

impl Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Filter used by tool pickers, `All` disables category filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(ToolCategory),
}

impl From<ToolCategory> for CategoryFilter {
    fn from(category: ToolCategory) -> Self {
        CategoryFilter::Only(category)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Array,
}

#[derive(Debug, Serialize)]
pub struct ToolParameter {
    pub name: &'static str,
    pub required: bool,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ToolExample {
    pub code: &'static str,
    pub result: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Tool {
    pub id: &'static str,
    pub name: &'static str,
    pub category: ToolCategory,
    pub description: &'static str,
    pub parameters: &'static [ToolParameter],
    pub output: &'static str,
    pub example: ToolExample,
}

impl Tool {
    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self
                .parameters
                .iter()
                .any(|p| p.name.to_lowercase().contains(needle))
    }
}

const fn param(
    name: &'static str,
    required: bool,
    kind: ParameterType,
    description: &'static str,
) -> ToolParameter {
    ToolParameter {
        name,
        required,
        kind,
        description,
    }
}

static TOOLS: &[Tool] = &[
    Tool {
        id: "read",
        name: "Read",
        category: ToolCategory::File,
        description: "Read file contents, including code, images and PDFs",
        parameters: &[
            param("file_path", true, ParameterType::String, "Absolute path"),
            param("offset", false, ParameterType::Number, "First line to read"),
            param("limit", false, ParameterType::Number, "Number of lines to read"),
        ],
        output: "File contents with line numbers",
        example: ToolExample {
            code: r#"Read("/home/user/app.js")"#,
            result: "Shows the JavaScript source",
        },
    },
    Tool {
        id: "write",
        name: "Write",
        category: ToolCategory::File,
        description: "Create or overwrite a file",
        parameters: &[
            param("file_path", true, ParameterType::String, "Absolute path"),
            param("content", true, ParameterType::String, "File contents"),
        ],
        output: "Confirmation that the file was written",
        example: ToolExample {
            code: r#"Write("/tmp/config.json", "{\"port\": 3000}")"#,
            result: "Creates a config file",
        },
    },
    Tool {
        id: "edit",
        name: "Edit",
        category: ToolCategory::File,
        description: "Replace an exact string inside a file",
        parameters: &[
            param("file_path", true, ParameterType::String, "Absolute path"),
            param("old_string", true, ParameterType::String, "Text to replace"),
            param("new_string", true, ParameterType::String, "Replacement text"),
            param("replace_all", false, ParameterType::Boolean, "Replace every occurrence"),
        ],
        output: "Confirmation of the replacement or an error",
        example: ToolExample {
            code: r#"Edit("app.js", "const port = 3000", "const port = 8080")"#,
            result: "Changes the port",
        },
    },
    Tool {
        id: "glob",
        name: "Glob",
        category: ToolCategory::Search,
        description: "Find files by pattern",
        parameters: &[
            param("pattern", true, ParameterType::String, "Glob pattern"),
            param("path", false, ParameterType::String, "Directory to search"),
        ],
        output: "Matching paths sorted by modification time",
        example: ToolExample {
            code: r#"Glob("**/*.py")"#,
            result: "Lists every Python file",
        },
    },
    Tool {
        id: "grep",
        name: "Grep",
        category: ToolCategory::Search,
        description: "Search file contents with ripgrep",
        parameters: &[
            param("pattern", true, ParameterType::String, "Regular expression"),
            param(
                "output_mode",
                false,
                ParameterType::String,
                "content/files_with_matches/count",
            ),
            param("glob", false, ParameterType::String, "File filter"),
            param("-i", false, ParameterType::Boolean, "Case insensitive"),
        ],
        output: "Matching lines, file paths or counts",
        example: ToolExample {
            code: r#"Grep("function.*User", output_mode="content")"#,
            result: "Finds user related functions",
        },
    },
    Tool {
        id: "bash",
        name: "Bash",
        category: ToolCategory::System,
        description: "Run a shell command",
        parameters: &[
            param("command", true, ParameterType::String, "Command line"),
            param("description", false, ParameterType::String, "What the command does"),
            param("timeout", false, ParameterType::Number, "Timeout"),
            param("run_in_background", false, ParameterType::Boolean, "Run detached"),
        ],
        output: "Command output, errors and exit code",
        example: ToolExample {
            code: r#"Bash("npm test")"#,
            result: "Runs the test suite",
        },
    },
    Tool {
        id: "webfetch",
        name: "WebFetch",
        category: ToolCategory::Web,
        description: "Fetch a web page and process its content",
        parameters: &[
            param("url", true, ParameterType::String, "Page URL"),
            param("prompt", true, ParameterType::String, "Processing prompt"),
        ],
        output: "Processed summary of the page",
        example: ToolExample {
            code: r#"WebFetch("https://docs.react.dev", "Extract installation steps")"#,
            result: "React installation guide",
        },
    },
    Tool {
        id: "websearch",
        name: "WebSearch",
        category: ToolCategory::Web,
        description: "Search the web for recent information",
        parameters: &[
            param("query", true, ParameterType::String, "Search terms"),
            param("allowed_domains", false, ParameterType::Array, "Domains to include"),
            param("blocked_domains", false, ParameterType::Array, "Domains to exclude"),
        ],
        output: "Formatted search results",
        example: ToolExample {
            code: r#"WebSearch("Next.js 14 new features")"#,
            result: "Overview of new Next.js features",
        },
    },
];

static INDEX: LazyLock<HashMap<&'static str, &'static Tool>> =
    LazyLock::new(|| TOOLS.iter().map(|tool| (tool.id, tool)).collect());

/// Handle to the process-wide tool table.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToolCatalog;

impl ToolCatalog {
    pub fn global() -> Self {
        ToolCatalog
    }

    /// All tools in catalog order.
    pub fn tools(&self) -> &'static [Tool] {
        TOOLS
    }

    pub fn get(&self, id: &str) -> Option<&'static Tool> {
        INDEX.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        INDEX.contains_key(id)
    }

    pub fn categories(&self) -> &'static [ToolCategory] {
        &ToolCategory::ALL
    }

    pub fn by_category(&self, filter: impl Into<CategoryFilter>) -> Vec<&'static Tool> {
        match filter.into() {
            CategoryFilter::All => TOOLS.iter().collect(),
            CategoryFilter::Only(category) => TOOLS
                .iter()
                .filter(|tool| tool.category == category)
                .collect(),
        }
    }

    /// Case-insensitive substring search over name, description and parameter names.
    pub fn search(&self, query: &str) -> Vec<&'static Tool> {
        let needle = query.to_lowercase();
        TOOLS.iter().filter(|tool| tool.matches(&needle)).collect()
    }

    /// Split `ids` into the ones the catalog knows (order kept) and the unknown ones.
    pub fn partition_known<'a, I>(&self, ids: I) -> (Vec<String>, Vec<String>)
    where
        I: IntoIterator<Item = &'a String>,
    {
        ids.into_iter()
            .cloned()
            .partition(|id| self.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id() {
        let catalog = ToolCatalog::global();
        let read = catalog.get("read").unwrap();
        assert_eq!(read.name, "Read");
        assert_eq!(read.category, ToolCategory::File);
        assert!(catalog.get("doesnotexist").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_eq!(INDEX.len(), TOOLS.len());
    }

    #[test]
    fn test_category_filter() {
        let catalog = ToolCatalog::global();
        assert_eq!(catalog.by_category(CategoryFilter::All).len(), 8);

        let web = catalog.by_category(ToolCategory::Web);
        let ids = web.iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids, vec!["webfetch", "websearch"]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let catalog = ToolCatalog::global();
        let ids = catalog
            .search("GLOB")
            .iter()
            .map(|t| t.id)
            .collect::<Vec<_>>();
        // Glob by name, Grep by its `glob` parameter
        assert_eq!(ids, vec!["glob", "grep"]);
    }

    #[test]
    fn test_search_matches_parameter_names() {
        let catalog = ToolCatalog::global();
        let ids = catalog
            .search("replace_all")
            .iter()
            .map(|t| t.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["edit"]);
    }

    #[test]
    fn test_partition_known() {
        let catalog = ToolCatalog::global();
        let ids = vec!["read".to_owned(), "doesnotexist".to_owned(), "bash".to_owned()];
        let (known, unknown) = catalog.partition_known(&ids);
        assert_eq!(known, vec!["read", "bash"]);
        assert_eq!(unknown, vec!["doesnotexist"]);
    }
}
