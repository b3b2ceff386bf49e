use lazy_static::lazy_static;
use regex::Regex;

/// Position of the streamed chunk holding the third-party token prefix
pub const AUTH_PREFIX_SLOT: usize = 13;
/// Position of the streamed chunk holding the third-party token suffix
pub const AUTH_SUFFIX_SLOT: usize = 14;

lazy_static! {
    static ref PROJECT_ID: Regex = Regex::new(r"(?i)/projects/([a-f0-9-]+)").unwrap();
    static ref SCRIPT_ELEMENT: Regex =
        Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").unwrap();
    static ref SCRIPT_SRC_ATTR: Regex = Regex::new(r"(?i)(?:^|\s)src\s*=").unwrap();
    static ref FLIGHT_PUSH: Regex = Regex::new(
        r#"__next_f(?:\s*=\s*self\.__next_f\s*\|\|\s*\[\]\s*\))?\.push\(\[\s*\d+(?:\s*,\s*("(?:[^"\\]|\\.)*")\s*\])?"#
    )
    .unwrap();
}

/// Which injected auth data slot to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSlot {
    Prefix,
    Suffix,
}

/// Read-only view of the hosting page's ambient state
///
/// Implementors hand out opaque text blobs; all pattern matching happens in
/// the token locator so that synthetic pages can be used in tests.
pub trait PageStateReader: Send + Sync {
    /// Text content of every inlined script on the page, in document order
    fn script_payloads(&self) -> Vec<String>;

    /// Content of a page-injected auth data slot, if present
    fn auth_slot(&self, slot: AuthSlot) -> Option<String>;

    /// Current page location (path or full URL)
    fn location(&self) -> Option<String>;

    /// Project id derived from the page location
    fn project_id(&self) -> Option<String> {
        self.location()
            .as_deref()
            .and_then(project_id_from_location)
    }
}

/// Extract the project id from a page path or URL
pub fn project_id_from_location(location: &str) -> Option<String> {
    PROJECT_ID
        .captures(location)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Page state assembled by hand
#[derive(Debug, Clone, Default)]
pub struct StaticPageState {
    scripts: Vec<String>,
    prefix_slot: Option<String>,
    suffix_slot: Option<String>,
    location: Option<String>,
}

impl StaticPageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, payload: impl Into<String>) -> Self {
        self.scripts.push(payload.into());
        self
    }

    pub fn with_auth_slots(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prefix_slot = Some(prefix.into());
        self.suffix_slot = Some(suffix.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl PageStateReader for StaticPageState {
    fn script_payloads(&self) -> Vec<String> {
        self.scripts.clone()
    }

    fn auth_slot(&self, slot: AuthSlot) -> Option<String> {
        match slot {
            AuthSlot::Prefix => self.prefix_slot.clone(),
            AuthSlot::Suffix => self.suffix_slot.clone(),
        }
    }

    fn location(&self) -> Option<String> {
        self.location.clone()
    }
}

/// Page state read from a saved HTML document
///
/// Inline scripts are `<script>` elements without a `src` attribute. Auth
/// slots are the string payloads of the page's streamed
/// `self.__next_f.push([..])` chunks, indexed in push order.
#[derive(Debug, Clone)]
pub struct HtmlPageState {
    scripts: Vec<String>,
    flight_chunks: Vec<Option<String>>,
    location: Option<String>,
}

impl HtmlPageState {
    pub fn parse(html: &str) -> Self {
        let scripts: Vec<String> = SCRIPT_ELEMENT
            .captures_iter(html)
            .filter(|c| !c.get(1).map_or(false, |a| SCRIPT_SRC_ATTR.is_match(a.as_str())))
            .filter_map(|c| c.get(2).map(|body| body.as_str().to_string()))
            .filter(|body| !body.trim().is_empty())
            .collect();

        let flight_chunks = scripts
            .iter()
            .flat_map(|script| FLIGHT_PUSH.captures_iter(script))
            .map(|c| {
                c.get(1)
                    .and_then(|quoted| serde_json::from_str::<String>(quoted.as_str()).ok())
            })
            .collect();

        Self {
            scripts,
            flight_chunks,
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    fn flight_chunk(&self, index: usize) -> Option<String> {
        self.flight_chunks.get(index).cloned().flatten()
    }
}

impl PageStateReader for HtmlPageState {
    fn script_payloads(&self) -> Vec<String> {
        self.scripts.clone()
    }

    fn auth_slot(&self, slot: AuthSlot) -> Option<String> {
        match slot {
            AuthSlot::Prefix => self.flight_chunk(AUTH_PREFIX_SLOT),
            AuthSlot::Suffix => self.flight_chunk(AUTH_SUFFIX_SLOT),
        }
    }

    fn location(&self) -> Option<String> {
        self.location.clone()
    }
}
