//! Decides whether supplementary knowledge is worth its tokens.

/// Decides whether a triggering message needs the knowledge text.
///
/// Swappable so the matching strategy can change without touching the
/// reply pipeline.
pub trait ContextClassifier: Send + Sync {
    /// Whether the knowledge text should be attached for this message.
    fn should_include_supplementary_context(&self, text: &str) -> bool;
}

/// Purchase-intent keywords (Spanish and English).
pub const PURCHASE_KEYWORDS: &[&str] = &[
    "precio",
    "cuanto",
    "cuánto",
    "cuesta",
    "cuestan",
    "costo",
    "comprar",
    "compra",
    "pedido",
    "ordenar",
    "envío",
    "envio",
    "producto",
    "catálogo",
    "catalogo",
    "disponible",
    "venden",
    "tienen",
    "promoción",
    "promocion",
    "descuento",
    "price",
    "cost",
    "how much",
    "buy",
    "purchase",
    "order",
    "product",
    "catalog",
    "shipping",
    "available",
    "discount",
];

/// Case-insensitive substring match against a fixed keyword list.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    /// Create a classifier from custom keywords.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Keywords in use (lowercased).
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(PURCHASE_KEYWORDS)
    }
}

impl ContextClassifier for KeywordClassifier {
    fn should_include_supplementary_context(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

/// Classifier that always (or never) attaches knowledge.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub bool);

impl ContextClassifier for FixedClassifier {
    fn should_include_supplementary_context(&self, _text: &str) -> bool {
        self.0
    }
}
