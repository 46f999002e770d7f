//! Display formatters for number and date columns.

use crate::codec::{CodecError, CodecResult};
use crate::model::value::OutlineDate;
use crate::style::keys::parse_decimal;
use crate::xml::{parse_yes_no, yes_no, XmlElement};
use log::warn;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnFormatter {
    Number {
        /// Fixed fraction digits; `None` keeps the value's own scale.
        decimal_places: Option<u32>,
        grouping: bool,
        prefix: String,
        suffix: String,
    },
    /// `strftime`-style pattern applied in UTC.
    Date { pattern: String },
}

impl ColumnFormatter {
    pub fn plain_number() -> Self {
        Self::Number {
            decimal_places: None,
            grouping: false,
            prefix: String::new(),
            suffix: String::new(),
        }
    }

    pub fn currency(symbol: &str) -> Self {
        Self::Number {
            decimal_places: Some(2),
            grouping: true,
            prefix: symbol.to_string(),
            suffix: String::new(),
        }
    }

    pub fn date(pattern: impl Into<String>) -> Self {
        Self::Date {
            pattern: pattern.into(),
        }
    }

    /// Formats a number; date formatters fall back to plain decimal text.
    pub fn format_number(&self, value: Decimal) -> String {
        let Self::Number {
            decimal_places,
            grouping,
            prefix,
            suffix,
        } = self
        else {
            return value.to_string();
        };

        let mut number = value;
        if let Some(places) = decimal_places {
            number = number.round_dp_with_strategy(*places, RoundingStrategy::MidpointAwayFromZero);
            number.rescale(*places);
        }
        let mut text = number.to_string();
        if *grouping {
            text = group_thousands(&text);
        }
        format!("{prefix}{text}{suffix}")
    }

    /// Formats a date; invalid patterns and out-of-range dates fall back to RFC 3339.
    pub fn format_date(&self, value: &OutlineDate) -> String {
        let Some(date) = value.to_datetime() else {
            return value.reference_seconds().to_string();
        };
        let Self::Date { pattern } = self else {
            return date.to_rfc3339();
        };
        let mut out = String::new();
        if write!(out, "{}", date.format(pattern)).is_err() {
            warn!(
                "event=date_format_fallback module=model status=fallback pattern_len={}",
                pattern.len()
            );
            return date.to_rfc3339();
        }
        out
    }

    /// Reads `<formatter kind=..>`; unknown kinds are dropped with a warning.
    ///
    /// # Errors
    /// - Returns `InvalidAttribute` for unparsable attribute values.
    pub fn from_oo3_xml(element: &XmlElement) -> CodecResult<Option<Self>> {
        match element.attribute("kind") {
            Some("number") => {
                let decimal_places = match element.attribute("decimal-places") {
                    Some(raw) => Some(raw.trim().parse().map_err(|_| invalid("decimal-places", raw))?),
                    None => None,
                };
                let grouping = match element.attribute("grouping") {
                    Some(raw) => parse_yes_no(raw).ok_or_else(|| invalid("grouping", raw))?,
                    None => false,
                };
                Ok(Some(Self::Number {
                    decimal_places,
                    grouping,
                    prefix: element.attribute("prefix").unwrap_or_default().to_string(),
                    suffix: element.attribute("suffix").unwrap_or_default().to_string(),
                }))
            }
            Some("date") => Ok(Some(Self::Date {
                pattern: element.attribute("pattern").unwrap_or("%Y-%m-%d").to_string(),
            })),
            other => {
                warn!(
                    "event=formatter_skipped module=model status=skipped kind={}",
                    other.unwrap_or("missing")
                );
                Ok(None)
            }
        }
    }

    pub fn to_oo3_xml(&self) -> XmlElement {
        match self {
            Self::Number {
                decimal_places,
                grouping,
                prefix,
                suffix,
            } => {
                let mut element = XmlElement::new("formatter").with_attribute("kind", "number");
                if let Some(places) = decimal_places {
                    element.set_attribute("decimal-places", places.to_string());
                }
                if *grouping {
                    element.set_attribute("grouping", yes_no(true));
                }
                if !prefix.is_empty() {
                    element.set_attribute("prefix", prefix.as_str());
                }
                if !suffix.is_empty() {
                    element.set_attribute("suffix", suffix.as_str());
                }
                element
            }
            Self::Date { pattern } => XmlElement::new("formatter")
                .with_attribute("kind", "date")
                .with_attribute("pattern", pattern.as_str()),
        }
    }
}

fn invalid(attribute: &str, value: &str) -> CodecError {
    CodecError::InvalidAttribute {
        element: "formatter".to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

fn group_thousands(text: &str) -> String {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Parses number text typed by a user or stored in legacy files.
pub fn parse_number_text(text: &str) -> Option<Decimal> {
    parse_decimal(&text.replace(',', ""))
}

#[cfg(test)]
mod tests {
    use super::{parse_number_text, ColumnFormatter};
    use crate::model::value::OutlineDate;
    use crate::xml::XmlElement;
    use rust_decimal::Decimal;

    #[test]
    fn number_formatter_rounds_groups_and_decorates() {
        let formatter = ColumnFormatter::currency("$");
        assert_eq!(formatter.format_number(Decimal::new(1234565, 3)), "$1,234.57");
        assert_eq!(formatter.format_number(Decimal::new(-1000000, 0)), "$-1,000,000.00");
        assert_eq!(
            ColumnFormatter::plain_number().format_number(Decimal::new(150, 2)),
            "1.50"
        );
    }

    #[test]
    fn date_formatter_uses_pattern_and_falls_back() {
        let date = OutlineDate::reference();
        assert_eq!(ColumnFormatter::date("%Y-%m-%d").format_date(&date), "2001-01-01");
        assert!(ColumnFormatter::date("%Q")
            .format_date(&date)
            .starts_with("2001-01-01T00:00:00"));
    }

    #[test]
    fn formatter_xml_round_trip_and_unknown_kind() {
        let formatter = ColumnFormatter::currency("€");
        let element = formatter.to_oo3_xml();
        assert_eq!(
            ColumnFormatter::from_oo3_xml(&element).unwrap(),
            Some(formatter)
        );

        let unknown = XmlElement::new("formatter").with_attribute("kind", "duration");
        assert_eq!(ColumnFormatter::from_oo3_xml(&unknown).unwrap(), None);
    }

    #[test]
    fn number_text_accepts_grouping_separators() {
        assert_eq!(parse_number_text("1,024.5"), Some(Decimal::new(10245, 1)));
        assert_eq!(parse_number_text("abc"), None);
    }
}
