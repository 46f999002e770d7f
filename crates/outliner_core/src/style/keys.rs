//! Style attribute values and the key codec table.
//!
//! # Responsibility
//! - Define typed style attribute values.
//! - Map every supported style key to its value codec and default.
//!
//! # Invariants
//! - Keys not present in `STYLE_KEYS` are never stored in a style.
//! - Decoding never fails loudly: malformed input yields `None`.

use crate::xml::{parse_yes_no, yes_no, XmlElement};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Style key name, always one of the `STYLE_KEYS` entries.
pub type StyleKey = &'static str;

/// Full or partial attribute set, keyed by style key.
pub type StyleAttributes = BTreeMap<StyleKey, StyleValue>;

/// RGBA colour with exact decimal components in `0..=1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Color {
    pub red: Decimal,
    pub green: Decimal,
    pub blue: Decimal,
    pub alpha: Decimal,
}

impl Color {
    pub fn rgb(red: Decimal, green: Decimal, blue: Decimal) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: Decimal::ONE,
        }
    }

    pub fn grey(white: Decimal) -> Self {
        Self::rgb(white, white, white)
    }

    pub fn black() -> Self {
        Self::grey(Decimal::ZERO)
    }

    pub fn clear() -> Self {
        Self {
            alpha: Decimal::ZERO,
            ..Self::grey(Decimal::ONE)
        }
    }

    fn is_grey(&self) -> bool {
        self.red == self.green && self.green == self.blue
    }
}

/// One typed style attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StyleValue {
    Text(String),
    Number(Decimal),
    Integer(i64),
    Bool(bool),
    Color(Color),
    Keyword(String),
}

/// Value class as written in the `class` attribute of registry entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleValueClass {
    String,
    Number,
    Integer,
    Bool,
    Color,
    Enum,
}

impl StyleValueClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Bool => "bool",
            Self::Color => "color",
            Self::Enum => "enum",
        }
    }
}

/// Encode/decode/equality functions for one value class.
pub struct ValueCodec {
    pub class: StyleValueClass,
    /// Reads the value carried by a `<value>` or `<style-attribute>` element.
    pub decode: fn(&XmlElement) -> Option<StyleValue>,
    /// Writes the value into a `<value>` or `<style-attribute>` element.
    pub encode: fn(&StyleValue, &mut XmlElement),
    pub equal: fn(&StyleValue, &StyleValue) -> bool,
}

/// Declarative definition of one supported style key.
pub struct StyleKeyDef {
    pub key: StyleKey,
    pub group: &'static str,
    pub codec: &'static ValueCodec,
    pub default: fn() -> StyleValue,
}

pub static STRING_CODEC: ValueCodec = ValueCodec {
    class: StyleValueClass::String,
    decode: decode_string,
    encode: encode_scalar,
    equal: same_value,
};

pub static NUMBER_CODEC: ValueCodec = ValueCodec {
    class: StyleValueClass::Number,
    decode: decode_number,
    encode: encode_scalar,
    equal: same_value,
};

pub static INTEGER_CODEC: ValueCodec = ValueCodec {
    class: StyleValueClass::Integer,
    decode: decode_integer,
    encode: encode_scalar,
    equal: same_value,
};

pub static BOOL_CODEC: ValueCodec = ValueCodec {
    class: StyleValueClass::Bool,
    decode: decode_bool,
    encode: encode_scalar,
    equal: same_value,
};

pub static COLOR_CODEC: ValueCodec = ValueCodec {
    class: StyleValueClass::Color,
    decode: decode_color,
    encode: encode_color,
    equal: same_value,
};

pub static ENUM_CODEC: ValueCodec = ValueCodec {
    class: StyleValueClass::Enum,
    decode: decode_keyword,
    encode: encode_scalar,
    equal: same_keyword,
};

/// Every style key understood by the registry, in serialization order.
pub static STYLE_KEYS: &[StyleKeyDef] = &[
    StyleKeyDef {
        key: "font-family",
        group: "font",
        codec: &STRING_CODEC,
        default: || StyleValue::Text("Helvetica".to_string()),
    },
    StyleKeyDef {
        key: "font-size",
        group: "font",
        codec: &NUMBER_CODEC,
        default: || StyleValue::Number(Decimal::from(12)),
    },
    StyleKeyDef {
        key: "font-weight",
        group: "font",
        codec: &INTEGER_CODEC,
        default: || StyleValue::Integer(5),
    },
    StyleKeyDef {
        key: "font-italic",
        group: "font",
        codec: &BOOL_CODEC,
        default: || StyleValue::Bool(false),
    },
    StyleKeyDef {
        key: "font-fill",
        group: "font",
        codec: &COLOR_CODEC,
        default: || StyleValue::Color(Color::black()),
    },
    StyleKeyDef {
        key: "text-background-color",
        group: "text",
        codec: &COLOR_CODEC,
        default: || StyleValue::Color(Color::clear()),
    },
    StyleKeyDef {
        key: "underline-style",
        group: "text",
        codec: &ENUM_CODEC,
        default: || StyleValue::Keyword("none".to_string()),
    },
    StyleKeyDef {
        key: "strikethrough-style",
        group: "text",
        codec: &ENUM_CODEC,
        default: || StyleValue::Keyword("none".to_string()),
    },
    StyleKeyDef {
        key: "baseline-offset",
        group: "text",
        codec: &NUMBER_CODEC,
        default: || StyleValue::Number(Decimal::ZERO),
    },
    StyleKeyDef {
        key: "superscript",
        group: "text",
        codec: &INTEGER_CODEC,
        default: || StyleValue::Integer(0),
    },
    StyleKeyDef {
        key: "kerning-adjust",
        group: "text",
        codec: &NUMBER_CODEC,
        default: || StyleValue::Number(Decimal::ZERO),
    },
    StyleKeyDef {
        key: "link",
        group: "text",
        codec: &STRING_CODEC,
        default: || StyleValue::Text(String::new()),
    },
    StyleKeyDef {
        key: "paragraph-alignment",
        group: "paragraph",
        codec: &ENUM_CODEC,
        default: || StyleValue::Keyword("natural".to_string()),
    },
    StyleKeyDef {
        key: "paragraph-line-height-multiple",
        group: "paragraph",
        codec: &NUMBER_CODEC,
        default: || StyleValue::Number(Decimal::ONE),
    },
    StyleKeyDef {
        key: "paragraph-spacing-before",
        group: "paragraph",
        codec: &NUMBER_CODEC,
        default: || StyleValue::Number(Decimal::ZERO),
    },
    StyleKeyDef {
        key: "paragraph-spacing-after",
        group: "paragraph",
        codec: &NUMBER_CODEC,
        default: || StyleValue::Number(Decimal::ZERO),
    },
    StyleKeyDef {
        key: "paragraph-first-line-head-indent",
        group: "paragraph",
        codec: &NUMBER_CODEC,
        default: || StyleValue::Number(Decimal::ZERO),
    },
    StyleKeyDef {
        key: "paragraph-head-indent",
        group: "paragraph",
        codec: &NUMBER_CODEC,
        default: || StyleValue::Number(Decimal::ZERO),
    },
    StyleKeyDef {
        key: "paragraph-tail-indent",
        group: "paragraph",
        codec: &NUMBER_CODEC,
        default: || StyleValue::Number(Decimal::ZERO),
    },
];

static KEY_INDEX: Lazy<HashMap<&'static str, &'static StyleKeyDef>> =
    Lazy::new(|| STYLE_KEYS.iter().map(|def| (def.key, def)).collect());

/// Looks up the definition for a key name.
pub fn key_def(key: &str) -> Option<&'static StyleKeyDef> {
    KEY_INDEX.get(key).copied()
}

/// Root defaults for every supported key.
pub fn default_attributes() -> StyleAttributes {
    STYLE_KEYS
        .iter()
        .map(|def| (def.key, (def.default)()))
        .collect()
}

/// Compares two values of `key` with that key's codec equality.
///
/// Unknown keys fall back to structural equality.
pub fn values_equal(key: &str, left: &StyleValue, right: &StyleValue) -> bool {
    match key_def(key) {
        Some(def) => (def.codec.equal)(left, right),
        None => left == right,
    }
}

fn same_value(left: &StyleValue, right: &StyleValue) -> bool {
    left == right
}

fn same_keyword(left: &StyleValue, right: &StyleValue) -> bool {
    match (left, right) {
        (StyleValue::Keyword(left), StyleValue::Keyword(right)) => left.eq_ignore_ascii_case(right),
        _ => left == right,
    }
}

fn decode_string(element: &XmlElement) -> Option<StyleValue> {
    Some(StyleValue::Text(element.text()))
}

fn decode_number(element: &XmlElement) -> Option<StyleValue> {
    parse_decimal(&element.text()).map(StyleValue::Number)
}

fn decode_integer(element: &XmlElement) -> Option<StyleValue> {
    element.text().trim().parse().ok().map(StyleValue::Integer)
}

fn decode_bool(element: &XmlElement) -> Option<StyleValue> {
    parse_yes_no(&element.text()).map(StyleValue::Bool)
}

fn decode_keyword(element: &XmlElement) -> Option<StyleValue> {
    let text = element.text();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(StyleValue::Keyword(trimmed.to_string()))
}

fn decode_color(element: &XmlElement) -> Option<StyleValue> {
    let color = element.element_for_name("color").ok()??;
    let component = |name: &str| color.attribute(name).and_then(parse_decimal);
    let alpha = match color.attribute("a") {
        Some(value) => parse_decimal(value)?,
        None => Decimal::ONE,
    };
    let parsed = match component("w") {
        Some(white) => Color::grey(white),
        None => Color::rgb(component("r")?, component("g")?, component("b")?),
    };
    Some(StyleValue::Color(Color { alpha, ..parsed }))
}

fn encode_scalar(value: &StyleValue, element: &mut XmlElement) {
    let text = match value {
        StyleValue::Text(text) | StyleValue::Keyword(text) => text.clone(),
        StyleValue::Number(number) => number.to_string(),
        StyleValue::Integer(integer) => integer.to_string(),
        StyleValue::Bool(flag) => yes_no(*flag).to_string(),
        StyleValue::Color(_) => return encode_color(value, element),
    };
    element.push_text(text);
}

fn encode_color(value: &StyleValue, element: &mut XmlElement) {
    let StyleValue::Color(color) = value else {
        return encode_scalar(value, element);
    };
    let mut node = XmlElement::new("color");
    if color.is_grey() {
        node.set_attribute("w", color.red.to_string());
    } else {
        node.set_attribute("r", color.red.to_string());
        node.set_attribute("g", color.green.to_string());
        node.set_attribute("b", color.blue.to_string());
    }
    if color.alpha != Decimal::ONE {
        node.set_attribute("a", color.alpha.to_string());
    }
    element.push_child(node);
}

/// Locale-insensitive exact decimal parsing.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text.trim()).ok()
}
