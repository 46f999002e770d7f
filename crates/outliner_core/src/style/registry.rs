//! Differential style registry.
//!
//! # Responsibility
//! - Own every partial style of one document in an arena.
//! - Resolve full attribute sets by walking inheritance chains.
//! - Build minimal diffs from full attribute sets and read/write style XML.
//!
//! # Invariants
//! - Style `0` is the root; it has no parent and carries every key.
//! - A non-root style stores a key only if it differs from what the style
//!   inherits through its parent and named-style mixins.
//! - Resolution depends only on chain topology, never on insertion order.
//! - Named-style mixins never form a cycle.

use crate::codec::{CodecError, CodecResult};
use crate::style::keys::{
    default_attributes, key_def, values_equal, StyleAttributes, StyleKey, StyleValue, STYLE_KEYS,
};
use crate::xml::XmlElement;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Handle of one partial style inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId(usize);

/// Identity of a named (user-visible) style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedStyle {
    pub identifier: String,
    pub name: String,
}

/// One link of an inheritance chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialStyle {
    parent: Option<StyleId>,
    inherits: Vec<StyleId>,
    explicit: StyleAttributes,
    named: Option<NamedStyle>,
    interned: bool,
}

impl PartialStyle {
    pub fn parent(&self) -> Option<StyleId> {
        self.parent
    }

    /// Named styles mixed in between the parent and this style's own keys.
    pub fn inherits(&self) -> &[StyleId] {
        &self.inherits
    }

    /// Keys stored by this style alone.
    pub fn explicit(&self) -> &StyleAttributes {
        &self.explicit
    }

    pub fn named(&self) -> Option<&NamedStyle> {
        self.named.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.inherits.is_empty() && self.explicit.is_empty()
    }
}

/// Errors from editor-path registry mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleError {
    DuplicateNamedStyle(String),
}

impl Display for StyleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNamedStyle(id) => write!(f, "named style `{id}` already exists"),
        }
    }
}

impl Error for StyleError {}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InternKey {
    parent: StyleId,
    inherits: Vec<StyleId>,
    explicit: Vec<(StyleKey, StyleValue)>,
}

impl InternKey {
    fn new(parent: StyleId, inherits: &[StyleId], explicit: &StyleAttributes) -> Self {
        Self {
            parent,
            inherits: inherits.to_vec(),
            explicit: explicit
                .iter()
                .map(|(key, value)| (*key, value.clone()))
                .collect(),
        }
    }
}

/// Arena of partial styles owned by one document.
#[derive(Debug, Clone)]
pub struct StyleRegistry {
    styles: Vec<PartialStyle>,
    interned: HashMap<InternKey, StyleId>,
    named_order: Vec<StyleId>,
    named_by_identifier: HashMap<String, StyleId>,
    registered_keys: Vec<StyleKey>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleRegistry {
    /// Creates a registry whose root carries the built-in defaults.
    pub fn new() -> Self {
        let root = PartialStyle {
            parent: None,
            inherits: Vec::new(),
            explicit: default_attributes(),
            named: None,
            interned: false,
        };
        Self {
            styles: vec![root],
            interned: HashMap::new(),
            named_order: Vec::new(),
            named_by_identifier: HashMap::new(),
            registered_keys: Vec::new(),
        }
    }

    pub fn root(&self) -> StyleId {
        StyleId(0)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Returns one style.
    ///
    /// # Panics
    /// Panics when `id` was issued by another registry.
    pub fn style(&self, id: StyleId) -> &PartialStyle {
        &self.styles[id.0]
    }

    /// Full attribute set of `id`, walking root to leaf.
    pub fn resolve(&self, id: StyleId) -> StyleAttributes {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.style(current).parent;
        }

        let mut resolved = StyleAttributes::new();
        for link in chain.into_iter().rev() {
            self.overlay_link(link, &mut resolved);
        }
        resolved
    }

    /// Attribute set the explicit keys of `id` are diffed against.
    pub fn inherited_attributes(&self, id: StyleId) -> StyleAttributes {
        let style = self.style(id);
        let mut base = match style.parent {
            Some(parent) => self.resolve(parent),
            None => return StyleAttributes::new(),
        };
        for mixin in &style.inherits {
            self.overlay_link(*mixin, &mut base);
        }
        base
    }

    fn overlay_link(&self, id: StyleId, into: &mut StyleAttributes) {
        let style = self.style(id);
        for mixin in &style.inherits {
            self.overlay_link(*mixin, into);
        }
        for (key, value) in &style.explicit {
            into.insert(*key, value.clone());
        }
    }

    fn diff_against(base: &StyleAttributes, attributes: &StyleAttributes) -> StyleAttributes {
        attributes
            .iter()
            .filter(|(key, value)| match base.get(*key) {
                Some(inherited) => !values_equal(key, inherited, value),
                None => true,
            })
            .map(|(key, value)| (*key, value.clone()))
            .collect()
    }

    fn base_for(&self, parent: StyleId, inherits: &[StyleId]) -> StyleAttributes {
        let mut base = self.resolve(parent);
        for mixin in inherits {
            self.overlay_link(*mixin, &mut base);
        }
        base
    }

    fn allocate(&mut self, style: PartialStyle) -> StyleId {
        let id = StyleId(self.styles.len());
        self.styles.push(style);
        id
    }

    fn intern(
        &mut self,
        parent: StyleId,
        inherits: Vec<StyleId>,
        explicit: StyleAttributes,
    ) -> StyleId {
        let key = InternKey::new(parent, &inherits, &explicit);
        if let Some(existing) = self.interned.get(&key) {
            return *existing;
        }
        let id = self.allocate(PartialStyle {
            parent: Some(parent),
            inherits,
            explicit,
            named: None,
            interned: true,
        });
        self.interned.insert(key, id);
        id
    }

    /// Allocates a fresh, unshared style under `parent`.
    pub fn allocate_style(&mut self, parent: StyleId, attributes: &StyleAttributes) -> StyleId {
        let explicit = Self::diff_against(&self.resolve(parent), attributes);
        self.allocate(PartialStyle {
            parent: Some(parent),
            inherits: Vec::new(),
            explicit,
            named: None,
            interned: false,
        })
    }

    /// Diffs a full attribute set against `parent`, sharing equal results.
    ///
    /// Keys absent from `attributes` are inherited from `parent`.
    pub fn partial_style_from_attributes(
        &mut self,
        attributes: &StyleAttributes,
        parent: StyleId,
    ) -> StyleId {
        let explicit = Self::diff_against(&self.resolve(parent), attributes);
        self.intern(parent, Vec::new(), explicit)
    }

    /// Re-derives the explicit keys of `id` from a fresh attribute set.
    ///
    /// Shared run styles are re-keyed, so every run holding `id` sees the edit.
    /// Styles that inherit from `id` drop keys that now equal their inherited
    /// value.
    ///
    /// # Panics
    /// Panics when `id` is the root style.
    pub fn recompute(&mut self, id: StyleId, attributes: &StyleAttributes) {
        assert!(id != self.root(), "the root style cannot be recomputed");
        let base = self.inherited_attributes(id);
        let explicit = Self::diff_against(&base, attributes);
        self.replace_explicit(id, explicit);
        self.minimize_dependents(id);
    }

    fn replace_explicit(&mut self, id: StyleId, explicit: StyleAttributes) {
        let style = &self.styles[id.0];
        if let (true, Some(parent)) = (style.interned, style.parent) {
            let old_key = InternKey::new(parent, &style.inherits, &style.explicit);
            let new_key = InternKey::new(parent, &style.inherits, &explicit);
            if self.interned.get(&old_key) == Some(&id) {
                self.interned.remove(&old_key);
            }
            self.interned.entry(new_key).or_insert(id);
        }
        self.styles[id.0].explicit = explicit;
    }

    /// Styles whose parent or mixin chain passes through `id`, excluding `id`.
    fn dependents_of(&self, id: StyleId) -> Vec<StyleId> {
        let mut reached = HashSet::from([id]);
        let mut dependents = Vec::new();
        loop {
            let before = dependents.len();
            for (index, style) in self.styles.iter().enumerate() {
                let candidate = StyleId(index);
                if reached.contains(&candidate) {
                    continue;
                }
                let links_reached = style.parent.is_some_and(|parent| reached.contains(&parent))
                    || style.inherits.iter().any(|mixin| reached.contains(mixin));
                if links_reached {
                    reached.insert(candidate);
                    dependents.push(candidate);
                }
            }
            if dependents.len() == before {
                return dependents;
            }
        }
    }

    // Dropping a key equal to its inherited value leaves every resolution
    // unchanged, so dependents can be pruned in any order.
    fn minimize_dependents(&mut self, id: StyleId) {
        for dependent in self.dependents_of(id) {
            let base = self.inherited_attributes(dependent);
            let current = &self.styles[dependent.0].explicit;
            let pruned = Self::diff_against(&base, current);
            if pruned.len() != current.len() {
                debug!(
                    "event=style_minimized module=style status=ok style={} dropped={}",
                    dependent.0,
                    current.len() - pruned.len()
                );
                self.replace_explicit(dependent, pruned);
            }
        }
    }

    /// Overrides one root default.
    pub fn set_default(&mut self, key: StyleKey, value: StyleValue) {
        self.styles[0].explicit.insert(key, value);
        if !self.registered_keys.contains(&key) {
            self.registered_keys.push(key);
        }
        self.minimize_dependents(self.root());
    }

    pub fn named_style(&self, identifier: &str) -> Option<StyleId> {
        self.named_by_identifier.get(identifier).copied()
    }

    /// Named styles in declaration order.
    pub fn named_styles(&self) -> &[StyleId] {
        &self.named_order
    }

    /// Adds one named style under the root.
    ///
    /// # Errors
    /// - Returns `DuplicateNamedStyle` when `identifier` is taken.
    pub fn add_named_style(
        &mut self,
        identifier: impl Into<String>,
        name: impl Into<String>,
        attributes: &StyleAttributes,
    ) -> Result<StyleId, StyleError> {
        let identifier = identifier.into();
        if self.named_by_identifier.contains_key(&identifier) {
            return Err(StyleError::DuplicateNamedStyle(identifier));
        }
        let explicit = Self::diff_against(&self.resolve(self.root()), attributes);
        Ok(self.push_named(identifier, name.into(), explicit))
    }

    fn push_named(&mut self, identifier: String, name: String, explicit: StyleAttributes) -> StyleId {
        let id = self.allocate(PartialStyle {
            parent: Some(self.root()),
            inherits: Vec::new(),
            explicit,
            named: Some(NamedStyle {
                identifier: identifier.clone(),
                name,
            }),
            interned: false,
        });
        self.named_order.push(id);
        self.named_by_identifier.insert(identifier, id);
        id
    }

    /// Reads `<style-attribute-registry>` and `<named-styles>` from a document element.
    ///
    /// # Errors
    /// - Returns `CodecError` for duplicate or cyclic named styles and
    ///   unresolved `inherited-style` references.
    pub fn from_oo3_xml(document: &XmlElement) -> CodecResult<Self> {
        let mut registry = Self::new();

        if let Some(element) = document.element_for_name("style-attribute-registry")? {
            registry.read_attribute_registry(element);
        }

        if let Some(element) = document.element_for_name("named-styles")? {
            let mut bodies = Vec::new();
            for named in element.elements_named("named-style") {
                let identifier = named
                    .attribute("id")
                    .ok_or_else(|| CodecError::MissingAttribute {
                        element: "named-style".to_string(),
                        attribute: "id".to_string(),
                    })?
                    .to_string();
                if registry.named_by_identifier.contains_key(&identifier) {
                    return Err(CodecError::DuplicateNamedStyle(identifier));
                }
                let name = named.attribute("name").unwrap_or_default().to_string();
                let id = registry.push_named(identifier, name, StyleAttributes::new());
                bodies.push((id, named.element_for_name("style")?));
            }

            // Bodies are read after every identifier is known so mixins may
            // refer forward.
            for (id, body) in bodies {
                let Some(body) = body else {
                    continue;
                };
                let (inherits, raw) = registry.read_style_body(body)?;
                let base = registry.base_for(registry.root(), &inherits);
                let explicit = Self::diff_against(&base, &raw);
                let style = &mut registry.styles[id.0];
                style.inherits = inherits;
                style.explicit = explicit;
            }
            registry.check_named_cycles()?;
        }

        Ok(registry)
    }

    fn read_attribute_registry(&mut self, element: &XmlElement) {
        for entry in element.elements_named("style-attribute") {
            let Some(key) = entry.attribute("key") else {
                warn!("event=style_attribute_skipped module=style status=skipped reason=missing_key");
                continue;
            };
            let Some(def) = key_def(key) else {
                warn!(
                    "event=style_attribute_skipped module=style status=skipped reason=unknown_key key={}",
                    key
                );
                continue;
            };
            if let Some(class) = entry.attribute("class") {
                if class != def.codec.class.as_str() {
                    warn!(
                        "event=style_attribute_skipped module=style status=skipped reason=class_mismatch key={} class={}",
                        key, class
                    );
                    continue;
                }
            }
            let has_default = entry.has_element_children() || !entry.text().trim().is_empty();
            if has_default {
                match (def.codec.decode)(entry) {
                    Some(value) => {
                        self.styles[0].explicit.insert(def.key, value);
                    }
                    None => {
                        warn!(
                            "event=style_attribute_skipped module=style status=skipped reason=malformed_default key={}",
                            key
                        );
                    }
                }
            }
            if !self.registered_keys.contains(&def.key) {
                self.registered_keys.push(def.key);
            }
        }
    }

    fn check_named_cycles(&self) -> CodecResult<()> {
        for id in &self.named_order {
            let mut visiting = HashSet::new();
            if self.mixins_reach(*id, *id, &mut visiting) {
                let identifier = self
                    .style(*id)
                    .named
                    .as_ref()
                    .map(|named| named.identifier.clone())
                    .unwrap_or_default();
                return Err(CodecError::CyclicStyleReference(identifier));
            }
        }
        Ok(())
    }

    fn mixins_reach(&self, from: StyleId, target: StyleId, visiting: &mut HashSet<StyleId>) -> bool {
        for mixin in &self.style(from).inherits {
            if *mixin == target {
                return true;
            }
            if visiting.insert(*mixin) && self.mixins_reach(*mixin, target, visiting) {
                return true;
            }
        }
        false
    }

    /// Reads mixins and raw explicit keys of one `<style>` element.
    fn read_style_body(
        &self,
        element: &XmlElement,
    ) -> CodecResult<(Vec<StyleId>, StyleAttributes)> {
        let mut inherits = Vec::new();
        let mut raw = StyleAttributes::new();

        for child in element.child_elements() {
            match child.name() {
                "inherited-style" => {
                    let refid = child.attribute("refid").unwrap_or_default();
                    let named = self
                        .named_style(refid)
                        .ok_or_else(|| CodecError::UnresolvedStyleReference(refid.to_string()))?;
                    if !inherits.contains(&named) {
                        inherits.push(named);
                    }
                }
                "value" => {
                    let Some(key) = child.attribute("key") else {
                        warn!("event=style_value_skipped module=style status=skipped reason=missing_key");
                        continue;
                    };
                    let Some(def) = key_def(key) else {
                        warn!(
                            "event=style_value_skipped module=style status=skipped reason=unknown_key key={}",
                            key
                        );
                        continue;
                    };
                    match (def.codec.decode)(child) {
                        Some(value) => {
                            raw.insert(def.key, value);
                        }
                        None => warn!(
                            "event=style_value_skipped module=style status=skipped reason=malformed_value key={}",
                            key
                        ),
                    }
                }
                other => warn!(
                    "event=style_element_skipped module=style status=skipped element={}",
                    other
                ),
            }
        }

        Ok((inherits, raw))
    }

    /// Parses an owner `<style>` (document, column, title) into a fresh style.
    ///
    /// # Errors
    /// - Returns `UnresolvedStyleReference` for unknown `inherited-style` refids.
    pub fn partial_style_for_oo3_xml(
        &mut self,
        element: Option<&XmlElement>,
        parent: StyleId,
    ) -> CodecResult<StyleId> {
        let (inherits, raw) = match element {
            Some(element) => self.read_style_body(element)?,
            None => (Vec::new(), StyleAttributes::new()),
        };
        let explicit = Self::diff_against(&self.base_for(parent, &inherits), &raw);
        Ok(self.allocate(PartialStyle {
            parent: Some(parent),
            inherits,
            explicit,
            named: None,
            interned: false,
        }))
    }

    /// Parses a run `<style>`; equal styles under the same parent share one id.
    ///
    /// A missing element yields `parent` itself.
    ///
    /// # Errors
    /// - Returns `UnresolvedStyleReference` for unknown `inherited-style` refids.
    pub fn run_style_for_oo3_xml(
        &mut self,
        element: Option<&XmlElement>,
        parent: StyleId,
    ) -> CodecResult<StyleId> {
        let Some(element) = element else {
            return Ok(parent);
        };
        let (inherits, raw) = self.read_style_body(element)?;
        let explicit = Self::diff_against(&self.base_for(parent, &inherits), &raw);
        if inherits.is_empty() && explicit.is_empty() {
            return Ok(parent);
        }
        Ok(self.intern(parent, inherits, explicit))
    }

    /// Serializes the explicit layer of `id` as `<style>`.
    pub fn style_to_oo3_xml(&self, id: StyleId) -> XmlElement {
        let style = self.style(id);
        let mut element = XmlElement::new("style");
        for mixin in &style.inherits {
            if let Some(named) = &self.style(*mixin).named {
                element.push_child(
                    XmlElement::new("inherited-style").with_attribute("refid", named.identifier.as_str()),
                );
            }
        }
        Self::push_values(&mut element, &style.explicit);
        element
    }

    /// Serializes `id` as seen from `base`, or `None` when nothing differs.
    ///
    /// Styles parented directly on `base` keep their mixins; others are
    /// flattened into a plain diff of resolved attributes.
    pub fn style_to_oo3_xml_relative_to(&self, id: StyleId, base: StyleId) -> Option<XmlElement> {
        if id == base {
            return None;
        }
        let style = self.style(id);
        if style.parent == Some(base) {
            if style.is_empty() {
                return None;
            }
            return Some(self.style_to_oo3_xml(id));
        }

        let diff = Self::diff_against(&self.resolve(base), &self.resolve(id));
        if diff.is_empty() {
            return None;
        }
        let mut element = XmlElement::new("style");
        Self::push_values(&mut element, &diff);
        Some(element)
    }

    fn push_values(element: &mut XmlElement, attributes: &StyleAttributes) {
        for (key, value) in attributes {
            let Some(def) = key_def(key) else {
                continue;
            };
            let mut node = XmlElement::new("value").with_attribute("key", *key);
            (def.codec.encode)(value, &mut node);
            element.push_child(node);
        }
    }

    /// Writes the registry-level elements that precede document content.
    pub fn to_oo3_xml(&self) -> Vec<XmlElement> {
        let mut elements = Vec::new();

        let root = &self.style(self.root()).explicit;
        let defaults = default_attributes();
        let keys: Vec<&'static str> = STYLE_KEYS
            .iter()
            .map(|def| def.key)
            .filter(|key| {
                self.registered_keys.contains(key)
                    || match (root.get(key), defaults.get(key)) {
                        (Some(current), Some(builtin)) => !values_equal(key, current, builtin),
                        _ => false,
                    }
            })
            .collect();
        if !keys.is_empty() {
            let mut registry = XmlElement::new("style-attribute-registry");
            for key in keys {
                let Some(def) = key_def(key) else {
                    continue;
                };
                let mut entry = XmlElement::new("style-attribute")
                    .with_attribute("key", key)
                    .with_attribute("group", def.group)
                    .with_attribute("class", def.codec.class.as_str());
                if let Some(value) = root.get(key) {
                    (def.codec.encode)(value, &mut entry);
                }
                registry.push_child(entry);
            }
            elements.push(registry);
        }

        if !self.named_order.is_empty() {
            let mut named_styles = XmlElement::new("named-styles");
            for id in &self.named_order {
                let style = self.style(*id);
                let Some(named) = &style.named else {
                    continue;
                };
                let mut element = XmlElement::new("named-style")
                    .with_attribute("id", named.identifier.as_str())
                    .with_attribute("name", named.name.as_str());
                if !style.is_empty() {
                    element.push_child(self.style_to_oo3_xml(*id));
                }
                named_styles.push_child(element);
            }
            elements.push(named_styles);
        }

        elements
    }
}

#[cfg(test)]
mod tests {
    use super::StyleRegistry;
    use crate::style::keys::{StyleAttributes, StyleValue};
    use crate::xml::XmlElement;
    use rust_decimal::Decimal;

    fn size(value: i64) -> StyleValue {
        StyleValue::Number(Decimal::from(value))
    }

    #[test]
    fn root_resolves_to_defaults() {
        let registry = StyleRegistry::new();
        let resolved = registry.resolve(registry.root());
        assert_eq!(resolved.get("font-size"), Some(&size(12)));
        assert_eq!(
            resolved.get("font-family"),
            Some(&StyleValue::Text("Helvetica".to_string()))
        );
    }

    #[test]
    fn diff_drops_inherited_values() {
        let mut registry = StyleRegistry::new();
        let mut attributes = registry.resolve(registry.root());
        attributes.insert("font-size", size(18));
        let id = registry.partial_style_from_attributes(&attributes, registry.root());
        let explicit = registry.style(id).explicit();
        assert_eq!(explicit.len(), 1);
        assert_eq!(explicit.get("font-size"), Some(&size(18)));
    }

    #[test]
    fn equal_run_styles_are_shared() {
        let mut registry = StyleRegistry::new();
        let element =
            XmlElement::parse(r#"<style><value key="font-italic">yes</value></style>"#).unwrap();
        let root = registry.root();
        let first = registry.run_style_for_oo3_xml(Some(&element), root).unwrap();
        let second = registry.run_style_for_oo3_xml(Some(&element), root).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.run_style_for_oo3_xml(None, root).unwrap(), root);
    }

    #[test]
    fn recompute_rekeys_shared_style() {
        let mut registry = StyleRegistry::new();
        let root = registry.root();
        let mut bold = StyleAttributes::new();
        bold.insert("font-weight", StyleValue::Integer(9));
        let id = registry.partial_style_from_attributes(&bold, root);

        let mut italic = StyleAttributes::new();
        italic.insert("font-italic", StyleValue::Bool(true));
        registry.recompute(id, &italic);

        assert_eq!(registry.partial_style_from_attributes(&italic, root), id);
        assert_ne!(registry.partial_style_from_attributes(&bold, root), id);
    }

    #[test]
    fn relative_serialization_flattens_foreign_chains() {
        let mut registry = StyleRegistry::new();
        let root = registry.root();
        let mut big = StyleAttributes::new();
        big.insert("font-size", size(20));
        let column = registry.allocate_style(root, &big);
        let run = registry.partial_style_from_attributes(&big, root);

        assert!(registry.style_to_oo3_xml_relative_to(column, column).is_none());
        // Same resolved attributes through a different chain.
        assert!(registry.style_to_oo3_xml_relative_to(run, column).is_none());
        let element = registry.style_to_oo3_xml_relative_to(root, column).unwrap();
        let value = element.element_for_name("value").unwrap().unwrap();
        assert_eq!(value.attribute("key"), Some("font-size"));
        assert_eq!(value.text(), "12");
    }
}
