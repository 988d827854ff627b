use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub backend: String,
    pub query: String,
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# Search results for: {}\n", self.query);
        if self.hits.is_empty() {
            out.push_str("\nNo results.\n");
            return out;
        }
        for (index, hit) in self.hits.iter().enumerate() {
            out.push_str(&format!("\n{}. [{}]({})\n", index + 1, hit.title, hit.url));
            if !hit.snippet.is_empty() {
                out.push_str(&format!("   {}\n", hit.snippet));
            }
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContents {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_markdown_numbers_hits_and_skips_empty_snippets() {
        let results = SearchResults {
            backend: "google".to_string(),
            query: "rust patch".to_string(),
            hits: vec![
                SearchHit {
                    title: "First".to_string(),
                    url: "https://a.example".to_string(),
                    snippet: "about a".to_string(),
                },
                SearchHit {
                    title: "Second".to_string(),
                    url: "https://b.example".to_string(),
                    snippet: String::new(),
                },
            ],
        };

        assert_eq!(
            results.render_markdown(),
            "# Search results for: rust patch\n\n1. [First](https://a.example)\n   about a\n\n2. [Second](https://b.example)\n"
        );
    }

    #[test]
    fn render_markdown_reports_no_results() {
        let results = SearchResults {
            backend: "exa".to_string(),
            query: "nothing".to_string(),
            hits: Vec::new(),
        };
        assert!(results.render_markdown().ends_with("No results.\n"));
    }
}
