use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_decimal::Decimal;

use super::{positive_rate, rate_from_total, FormatAdapter, PayloadFormat};
use crate::conversion::ConversionRequest;
use crate::error::{ProviderError, ProviderResult};

const CURRENCY_ATTRS: &[&str] = &["currency", "code"];
const VALUE_ATTRS: &[&str] = &["rate", "value"];
const BASE_ATTRS: &[&str] = &["base", "source"];

/// Decodes element trees with one rate node per currency:
///
/// ```xml
/// <rates base="USD">
///   <rate currency="EUR">0.91</rate>
///   <rate currency="GBP" value="0.78"/>
/// </rates>
/// ```
///
/// Any element below the root carrying a `currency` (or `code`) attribute is
/// a rate node. Its value is the `rate`/`value` attribute, or the element
/// text when no such attribute exists. A `base` attribute on the root must
/// match the request source.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlRatesAdapter;

/// Decodes a converted total: `<XML><Result>910.00</Result></XML>`.
///
/// The rate is derived as `total / amount`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlTotalAdapter;

struct RateNode {
    level: usize,
    currency: String,
    value: String,
    from_attribute: bool,
}

impl FormatAdapter for XmlRatesAdapter {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Xml
    }

    fn decode(&self, payload: &str, request: &ConversionRequest) -> ProviderResult<Decimal> {
        let mut open: Option<RateNode> = None;
        let mut matched: Option<String> = None;

        walk(payload, |level, event| {
            match event {
                Event::Start(e) | Event::Empty(e) if level == 0 => check_base(e, request)?,
                Event::Start(e) => {
                    if let Some(node) = rate_node(e, level)? {
                        open = Some(node);
                    }
                }
                Event::Empty(e) => {
                    if let Some(node) = rate_node(e, level)? {
                        record(node, request, &mut matched);
                    }
                }
                Event::Text(t) => {
                    if let Some(node) = open.as_mut().filter(|node| !node.from_attribute) {
                        node.value.push_str(&t.unescape().map_err(parse_error)?);
                    }
                }
                Event::End(_) => {
                    if open.as_ref().is_some_and(|node| node.level == level) {
                        if let Some(node) = open.take() {
                            record(node, request, &mut matched);
                        }
                    }
                }
                _ => {}
            }
            Ok(())
        })?;

        match matched {
            Some(value) => positive_rate(&value),
            None => Err(ProviderError::UnsupportedPair(request.pair().to_string())),
        }
    }
}

impl FormatAdapter for XmlTotalAdapter {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::XmlTotal
    }

    fn decode(&self, payload: &str, request: &ConversionRequest) -> ProviderResult<Decimal> {
        let mut result_level: Option<usize> = None;
        let mut text = String::new();
        let mut total: Option<String> = None;

        walk(payload, |level, event| {
            match event {
                Event::Start(e) if level > 0 && total.is_none() && is_result(e) => {
                    result_level = Some(level);
                }
                Event::Text(t) if result_level.is_some() => {
                    text.push_str(&t.unescape().map_err(parse_error)?);
                }
                Event::End(_) if result_level == Some(level) => {
                    result_level = None;
                    total = Some(std::mem::take(&mut text));
                }
                _ => {}
            }
            Ok(())
        })?;

        let total = total.ok_or_else(|| ProviderError::Parse("missing Result element".into()))?;
        rate_from_total(positive_rate(&total)?, request)
    }
}

/// Feed every event of a single-rooted, fully closed document to `visit`.
///
/// `level` is the nesting depth of the element an event belongs to: 0 for
/// the root's start and end tags, 1 for its children, and so on. Text is
/// reported at the depth of its enclosing element's children.
fn walk<'a>(
    payload: &'a str,
    mut visit: impl FnMut(usize, &Event<'a>) -> ProviderResult<()>,
) -> ProviderResult<()> {
    let mut reader = Reader::from_str(payload);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(parse_error)?;
        let level = match &event {
            Event::Start(_) | Event::Empty(_) => {
                if depth == 0 && saw_root {
                    return Err(ProviderError::Parse("multiple root elements".into()));
                }
                saw_root = true;
                depth
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ProviderError::Parse("unexpected closing tag".into()))?;
                depth
            }
            Event::Eof => break,
            _ => depth,
        };

        visit(level, &event)?;

        if matches!(event, Event::Start(_)) {
            depth += 1;
        }
    }

    if !saw_root {
        return Err(ProviderError::Parse("empty XML document".into()));
    }
    if depth != 0 {
        return Err(ProviderError::Parse(format!(
            "truncated XML document: {depth} element(s) left open"
        )));
    }
    Ok(())
}

fn parse_error(err: impl std::fmt::Display) -> ProviderError {
    ProviderError::Parse(err.to_string())
}

fn attribute(element: &BytesStart<'_>, names: &[&str]) -> ProviderResult<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(parse_error)?;
        let key = attr.key.local_name();
        if names
            .iter()
            .any(|name| key.as_ref().eq_ignore_ascii_case(name.as_bytes()))
        {
            let value = attr.unescape_value().map_err(parse_error)?;
            return Ok(Some(value.trim().to_string()));
        }
    }
    Ok(None)
}

fn is_result(element: &BytesStart<'_>) -> bool {
    element.local_name().as_ref().eq_ignore_ascii_case(b"result")
}

fn check_base(root: &BytesStart<'_>, request: &ConversionRequest) -> ProviderResult<()> {
    match attribute(root, BASE_ATTRS)? {
        Some(base) if !base.eq_ignore_ascii_case(request.source().code()) => Err(
            ProviderError::UnsupportedPair(format!("rates are based on {base}, not {}", request.source())),
        ),
        _ => Ok(()),
    }
}

fn rate_node(element: &BytesStart<'_>, level: usize) -> ProviderResult<Option<RateNode>> {
    let Some(currency) = attribute(element, CURRENCY_ATTRS)? else {
        return Ok(None);
    };
    let value = attribute(element, VALUE_ATTRS)?;
    Ok(Some(RateNode {
        level,
        currency,
        from_attribute: value.is_some(),
        value: value.unwrap_or_default(),
    }))
}

fn record(node: RateNode, request: &ConversionRequest, matched: &mut Option<String>) {
    if matched.is_none() && node.currency.eq_ignore_ascii_case(request.target().code()) {
        *matched = Some(node.value);
    }
}
