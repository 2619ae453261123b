//! Selector adapter over `scraper`
//!
//! Selector expressions are CSS selectors with an optional suffix choosing what
//! each matched element yields:
//!
//! - `css::text` - the element's own text nodes, one string per node
//! - `css::attr(name)` - the value of attribute `name`
//! - `css` - the element's full descendant text
//!
//! An empty CSS part (`::text`, `::attr(href)`) addresses the context element.

use scraper::{ElementRef, Html, Selector};
use std::fmt;
use url::Url;

use crate::url::resolve_link;

/// A fetched HTML document together with the URL it was served from
pub struct Document {
    url: Url,
    html: Html,
}

impl Document {
    /// Parses an HTML body fetched from `url`
    pub fn parse(body: &str, url: Url) -> Self {
        Self {
            url,
            html: Html::parse_document(body),
        }
    }

    /// The URL the document was fetched from, used as the base for links
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The root element every top-level selector is evaluated against
    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    OwnText,
    Text,
    Attr(String),
}

/// A compiled selector expression
#[derive(Clone)]
pub struct SelectorExpr {
    raw: String,
    css: Option<Selector>,
    target: Target,
}

impl SelectorExpr {
    /// Compiles a selector expression
    ///
    /// # Examples
    ///
    /// ```
    /// use trawl::extract::SelectorExpr;
    ///
    /// assert!(SelectorExpr::parse("a.next::attr(href)").is_ok());
    /// assert!(SelectorExpr::parse("h1::text").is_ok());
    /// assert!(SelectorExpr::parse("div[").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let (css_part, target) = split_target(trimmed)?;

        let css_part = css_part.trim();
        let css = if css_part.is_empty() {
            None
        } else {
            Some(Selector::parse(css_part).map_err(|e| format!("{:?}", e))?)
        };

        Ok(Self {
            raw: trimmed.to_string(),
            css,
            target,
        })
    }

    /// The expression as written in the schema
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the elements matched below `scope` in document order
    pub fn select<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        match &self.css {
            Some(css) => scope.select(css).collect(),
            None => vec![scope],
        }
    }

    /// Returns every string the expression yields below `scope`
    pub fn query(&self, scope: ElementRef<'_>) -> Vec<String> {
        let mut values = Vec::new();

        for element in self.select(scope) {
            match &self.target {
                Target::OwnText => values.extend(
                    element
                        .children()
                        .filter_map(|node| node.value().as_text())
                        .map(|text| text.to_string()),
                ),
                Target::Text => values.push(element.text().collect::<String>()),
                Target::Attr(name) => {
                    if let Some(value) = element.value().attr(name) {
                        values.push(value.to_string());
                    }
                }
            }
        }

        values
    }

    /// Returns the absolute links the expression yields below `scope`
    ///
    /// Each string is resolved against `base`; strings that do not resolve to
    /// an HTTP(S) URL are skipped.
    pub fn query_links(&self, scope: ElementRef<'_>, base: &Url) -> Vec<Url> {
        self.query(scope)
            .iter()
            .filter_map(|href| resolve_link(href, base))
            .collect()
    }
}

impl fmt::Debug for SelectorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SelectorExpr").field(&self.raw).finish()
    }
}

impl fmt::Display for SelectorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_target(expr: &str) -> Result<(&str, Target), String> {
    if let Some(css) = expr.strip_suffix("::text") {
        return Ok((css, Target::OwnText));
    }

    if let Some(start) = expr.rfind("::attr(") {
        let rest = &expr[start + "::attr(".len()..];
        let name = rest
            .strip_suffix(')')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| format!("malformed attribute suffix in '{}'", expr))?;
        return Ok((&expr[..start], Target::Attr(name.to_string())));
    }

    if expr.is_empty() {
        return Err("selector cannot be empty".to_string());
    }

    Ok((expr, Target::Text))
}
