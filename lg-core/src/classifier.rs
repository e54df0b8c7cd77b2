//! Turns raw generation text into a chat reply and, when it holds markup, a preview document.
//!
//! Matchers run in order and the first one that claims the text wins:
//! bundle, fenced block, raw markup. Anything left is plain text.

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// A filename→content object flattened into one HTML document.
    Bundle { document: String, files: Vec<String> },
    Markup { document: String },
}

impl Artifact {
    pub fn document(&self) -> &str {
        match self {
            Artifact::Bundle { document, .. } | Artifact::Markup { document } => document,
        }
    }

    pub fn summary(&self, prompt: &str) -> String {
        match self {
            Artifact::Bundle { files, .. } => format!(
                "I've generated a project with the following files: {}.",
                files.join(", ")
            ),
            Artifact::Markup { .. } => {
                format!("I've generated a preview for your request: \"{prompt}\"")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub chat_text: String,
    pub preview: Option<String>,
}

type Matcher = fn(&str) -> Option<Artifact>;

const MATCHERS: [Matcher; 3] = [bundle, fenced_markup, raw_markup];

pub fn detect(text: &str) -> Option<Artifact> {
    MATCHERS.iter().find_map(|matcher| matcher(text))
}

pub fn classify(text: &str, prompt: &str) -> Classified {
    match detect(text) {
        Some(artifact) => Classified {
            chat_text: artifact.summary(prompt),
            preview: Some(artifact.document().to_string()),
        },
        None => Classified {
            chat_text: text.to_string(),
            preview: None,
        },
    }
}

/// A JSON object whose keys look like filenames and which includes an HTML file.
/// Only the HTML file must be a string; other non-string entries are not inlined.
pub fn bundle(text: &str) -> Option<Artifact> {
    let serde_json::Value::Object(map) = serde_json::from_str::<serde_json::Value>(text).ok()? else {
        return None;
    };
    if !map.keys().any(|k| k.contains('.')) {
        return None;
    }
    let mut document = map
        .iter()
        .find(|(name, _)| is_html(name))
        .and_then(|(_, content)| content.as_str())?
        .to_string();
    for css in sources(&map, ".css") {
        document = document.replacen("</head>", &format!("<style>{css}</style></head>"), 1);
    }
    for js in sources(&map, ".js") {
        document = document.replacen("</body>", &format!("<script>{js}</script></body>"), 1);
    }

    Some(Artifact::Bundle {
        document,
        files: map.keys().cloned().collect(),
    })
}

fn sources<'a>(
    map: &'a serde_json::Map<String, serde_json::Value>,
    suffix: &'a str,
) -> impl Iterator<Item = &'a str> {
    map.iter()
        .filter(move |(name, _)| name.ends_with(suffix))
        .filter_map(|(_, content)| content.as_str())
}

fn is_html(name: &str) -> bool {
    name.ends_with(".html") || name.ends_with(".htm")
}

pub fn fenced_markup(text: &str) -> Option<Artifact> {
    let block = fenced_block(text.trim())?;
    block.starts_with('<').then(|| Artifact::Markup {
        document: block.to_string(),
    })
}

/// Only applies when the text holds no fenced block at all.
pub fn raw_markup(text: &str) -> Option<Artifact> {
    let trimmed = text.trim();
    if fenced_block(trimmed).is_some() || !trimmed.starts_with('<') {
        return None;
    }
    Some(Artifact::Markup {
        document: trimmed.to_string(),
    })
}

/// Trimmed content of the first triple-backtick block, with an optional `html` tag
/// stripped. Empty blocks count as absent.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let rest = &text[start..];
    let rest = rest.strip_prefix("html").unwrap_or(rest);
    let end = rest.find(FENCE)?;
    let content = rest[..end].trim();
    (!content.is_empty()).then_some(content)
}
