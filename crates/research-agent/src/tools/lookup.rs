use reqwest::{Client, Url, header};
use research_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;

const ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
const DEFAULT_TOP_K_RESULTS: usize = 1;
const DEFAULT_DOC_CONTENT_CHARS_MAX: usize = 100;
const NO_RESULTS: &str = "No good Wikipedia Search Result was found";

/// Encyclopedia lookup through the Wikipedia action API.
///
/// The tool searches page titles, then fetches the plain-text introduction
/// of the best `top_k_results` pages. The combined text is cut to
/// `doc_content_chars_max` characters, so keep that small unless the model
/// has a large context.
#[derive(Clone, Debug)]
pub struct LookupTool {
    client: Client,
    endpoint: String,
    top_k_results: usize,
    doc_content_chars_max: usize,
}

impl LookupTool {
    /// Creates a lookup tool with the default settings.
    #[inline]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: ENDPOINT.to_owned(),
            top_k_results: DEFAULT_TOP_K_RESULTS,
            doc_content_chars_max: DEFAULT_DOC_CONTENT_CHARS_MAX,
        }
    }

    /// Sets how many pages are summarized per lookup.
    #[inline]
    pub fn with_top_k_results(mut self, top_k_results: usize) -> Self {
        self.top_k_results = top_k_results.max(1);
        self
    }

    /// Sets the maximum length of the output, in characters.
    #[inline]
    pub fn with_doc_content_chars_max(mut self, chars: usize) -> Self {
        self.doc_content_chars_max = chars;
        self
    }

    /// Points the tool at a different MediaWiki API endpoint.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Default for LookupTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for LookupTool {
    fn name(&self) -> &str {
        "lookup"
    }

    fn description(&self) -> &str {
        "Look up a topic on Wikipedia. Input is a topic or page title; output \
         is the summary of the best matching page."
    }

    fn execute(
        &self,
        input: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let api = WikiApi {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
        };
        let top_k_results = self.top_k_results;
        let chars_max = self.doc_content_chars_max;
        async move {
            let query = input.trim();
            if query.is_empty() {
                return Err(
                    ToolError::execution_error().with_reason("query is empty")
                );
            }
            debug!("looking up {query:?}");

            let titles = api.search(query, top_k_results).await?;
            let mut pages = Vec::with_capacity(titles.len());
            for title in &titles {
                if let Some(page) = api.extract(title).await? {
                    pages.push(page);
                }
            }
            Ok(format_pages(&pages, chars_max))
        }
    }
}

struct WikiApi {
    client: Client,
    endpoint: String,
}

impl WikiApi {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, ToolError> {
        let limit = limit.to_string();
        let resp: SearchResponse = self
            .get(&[
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("srprop", ""),
            ])
            .await?;
        Ok(resp.into_titles())
    }

    async fn extract(&self, title: &str) -> Result<Option<Page>, ToolError> {
        let resp: ExtractResponse = self
            .get(&[
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;
        Ok(resp.into_page())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, ToolError> {
        let common = [
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
        ];
        let url = Url::parse_with_params(
            &self.endpoint,
            common.iter().chain(params.iter()),
        )
        .map_err(|err| {
            ToolError::execution_error()
                .with_reason(format!("invalid endpoint: {err}"))
        })?;

        let resp = self
            .client
            .get(url)
            .header(header::USER_AGENT, super::USER_AGENT)
            .send()
            .await
            .map_err(|err| {
                ToolError::execution_error()
                    .with_reason(format!("Wikipedia request failed: {err}"))
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::execution_error()
                .with_reason(format!("Wikipedia returned {status}")));
        }
        resp.json().await.map_err(|err| {
            ToolError::execution_error()
                .with_reason(format!("unexpected Wikipedia response: {err}"))
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: SearchQuery,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

impl SearchResponse {
    fn into_titles(self) -> Vec<String> {
        self.query.search.into_iter().map(|hit| hit.title).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: ExtractQuery,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    missing: bool,
}

impl ExtractResponse {
    fn into_page(self) -> Option<Page> {
        self.query
            .pages
            .into_iter()
            .find(|page| !page.missing && !page.extract.trim().is_empty())
    }
}

fn format_pages(pages: &[Page], chars_max: usize) -> String {
    if pages.is_empty() {
        return NO_RESULTS.to_owned();
    }
    let text = pages
        .iter()
        .map(|page| {
            format!("Page: {}\nSummary: {}", page.title, page.extract.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&text, chars_max).to_owned()
}

/// Cuts `text` to at most `max` characters, on a character boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn page(title: &str, extract: &str) -> Page {
        Page {
            title: title.to_owned(),
            extract: extract.to_owned(),
            missing: false,
        }
    }

    #[test]
    fn test_decode_search() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "batchcomplete": true,
            "query": {
                "searchinfo": { "totalhits": 2 },
                "search": [
                    { "ns": 0, "title": "Paris", "pageid": 22989 },
                    { "ns": 0, "title": "Paris Hilton", "pageid": 38030 }
                ]
            }
        }))
        .unwrap();
        assert_eq!(resp.into_titles(), ["Paris", "Paris Hilton"]);

        // No hits at all: Wikipedia omits `query` in some error replies.
        let resp: SearchResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.into_titles().is_empty());
    }

    #[test]
    fn test_decode_extract() {
        let resp: ExtractResponse = serde_json::from_value(json!({
            "query": {
                "pages": [{
                    "pageid": 22989,
                    "title": "Paris",
                    "extract": "Paris is the capital of France.\n"
                }]
            }
        }))
        .unwrap();
        assert_eq!(
            resp.into_page(),
            Some(page("Paris", "Paris is the capital of France.\n"))
        );

        let resp: ExtractResponse = serde_json::from_value(json!({
            "query": { "pages": [{ "title": "Nowhere", "missing": true }] }
        }))
        .unwrap();
        assert_eq!(resp.into_page(), None);
    }

    #[test]
    fn test_format_pages() {
        let pages = [
            page("Paris", "Paris is the capital of France."),
            page("France", "France is a country."),
        ];
        assert_eq!(
            format_pages(&pages, 1000),
            "Page: Paris\nSummary: Paris is the capital of France.\n\n\
             Page: France\nSummary: France is a country."
        );
        assert_eq!(format_pages(&pages, 11), "Page: Paris");
        assert_eq!(format_pages(&[], 100), NO_RESULTS);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("日本語", 2), "日本");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[tokio::test]
    async fn test_empty_query() {
        let err = LookupTool::new().execute(String::new()).await.unwrap_err();
        assert!(err.reason().contains("empty"));
    }
}
