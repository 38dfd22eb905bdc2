use std::fmt::{self, Display, Formatter};

use reqwest::{Client, Url, header};
use research_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use scraper::{ElementRef, Html, Selector};

const ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_MAX_RESULTS: usize = 5;
const NO_RESULTS: &str = "No good DuckDuckGo Search Result was found";

/// Web search through DuckDuckGo's HTML endpoint.
#[derive(Clone, Debug)]
pub struct SearchTool {
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl SearchTool {
    /// Creates a search tool with the default settings.
    #[inline]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: ENDPOINT.to_owned(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Sets the maximum number of results returned to the model.
    #[inline]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Points the tool at a different endpoint.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Default for SearchTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Input is a search query; output is \
         a list of result snippets with their sources."
    }

    fn execute(
        &self,
        input: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let max_results = self.max_results;
        async move {
            let query = input.trim();
            if query.is_empty() {
                return Err(
                    ToolError::execution_error().with_reason("query is empty")
                );
            }
            debug!("searching for {query:?}");

            let url = Url::parse_with_params(&endpoint, &[("q", query)])
                .map_err(|err| {
                    ToolError::execution_error()
                        .with_reason(format!("invalid endpoint: {err}"))
                })?;
            let resp = client
                .get(url)
                .header(header::USER_AGENT, super::USER_AGENT)
                .send()
                .await
                .map_err(|err| {
                    ToolError::execution_error()
                        .with_reason(format!("search request failed: {err}"))
                })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ToolError::execution_error()
                    .with_reason(format!("search service returned {status}")));
            }
            let html = resp.text().await.map_err(|err| {
                ToolError::execution_error()
                    .with_reason(format!("failed to read search results: {err}"))
            })?;

            let results = parse_results(&html, max_results);
            trace!("got {} search results", results.len());
            Ok(format_results(&results))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

impl Display for SearchResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = if self.snippet.is_empty() {
            &self.title
        } else {
            &self.snippet
        };
        write!(f, "{text} ({})", self.url)
    }
}

fn parse_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel), Ok(url_sel)) = (
        Selector::parse("div.result:not(.result--ad)"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
        Selector::parse(".result__url"),
    ) else {
        return vec![];
    };

    let document = Html::parse_document(html);
    document
        .select(&result_sel)
        .filter_map(|result| {
            let title_el = result.select(&title_sel).next()?;
            let title = element_text(&title_el);
            let url = result
                .select(&url_sel)
                .next()
                .map(|el| element_text(&el))
                .filter(|url| !url.is_empty())
                .or_else(|| title_el.value().attr("href").map(str::to_owned))?;
            let snippet = result
                .select(&snippet_sel)
                .next()
                .map(|el| element_text(&el))
                .unwrap_or_default();
            if title.is_empty() && snippet.is_empty() {
                return None;
            }
            Some(SearchResult {
                title,
                url,
                snippet,
            })
        })
        .take(max_results)
        .collect()
}

/// Text content with whitespace runs collapsed.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_owned();
    }
    results
        .iter()
        .map(SearchResult::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
