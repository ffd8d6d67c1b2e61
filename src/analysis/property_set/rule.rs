//! Property rule specification and resolution.
//!
//! A [`PropertyRule`] names the object types to track, the fields whose
//! literal assignments drive each property slot, how a fresh object
//! starts out, and the calls at which an object's property vector must
//! be classified. Like taint rules, property rules are written in names
//! and resolved against a concrete module once per session.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::{
    analysis::{
        matcher::{any_type, resolve_types, CalleeMatcher, CalleeSpec, TypeMatcher, TypeSpec},
        property_set::value::{PropertyValue, PropertyValues},
    },
    ir::{Callee, FieldId, Literal, Module, TypeId},
    session::Classification,
};

/// Maps a constructor call's literal arguments to initial property values.
///
/// The slice has one entry per argument; non-literal arguments read as
/// `None`. The returned vector is padded or truncated to the rule's
/// property count.
pub type ConstructorMapper = Arc<dyn Fn(&[Option<&Literal>]) -> PropertyValues + Send + Sync>;

/// Maps a literal assigned to a matched field to the property state it
/// puts the object in.
pub type LiteralMapper = Arc<dyn Fn(&Literal) -> PropertyValue + Send + Sync>;

/// Classifies a hazard site from the tracked argument's property vector.
pub type HazardEvaluator = Arc<dyn Fn(&PropertyValues) -> Classification + Send + Sync>;

/// Classifies by the worst property slot.
///
/// Any `Flagged` slot flags the site; any `MaybeFlagged` or `Unknown`
/// slot makes it a maybe; a vector of pure `Unflagged` is unflagged.
/// The evaluator most hazard specs want.
#[must_use]
pub fn worst_case(values: &PropertyValues) -> Classification {
    let mut result = Classification::Unflagged;
    for &value in values.values() {
        match value {
            PropertyValue::Flagged => return Classification::Flagged,
            PropertyValue::MaybeFlagged | PropertyValue::Unknown => {
                result = Classification::MaybeFlagged;
            }
            PropertyValue::Unflagged => {}
        }
    }
    result
}

struct PropertySpec {
    field: String,
    mapper: LiteralMapper,
}

struct HazardSpec {
    callee: CalleeSpec,
    position: Option<u16>,
    evaluator: HazardEvaluator,
}

/// Specification of one property-state rule, written in names.
///
/// # Examples
///
/// ```rust,ignore
/// use flowscope::analysis::{CalleeSpec, PropertyRule, PropertyValue, TypeSpec};
///
/// // Cookies default to insecure; sending one that was never marked
/// // secure is the hazard.
/// let rule = PropertyRule::new("insecure-cookie")
///     .track_type(TypeSpec::named("Cookie"))
///     .property_bool("Secure", PropertyValue::Unflagged, PropertyValue::Flagged)
///     .initial(vec![PropertyValue::Flagged])
///     .hazard(CalleeSpec::symbol("Response.AddCookie"), flowscope::analysis::worst_case);
/// ```
pub struct PropertyRule {
    name: String,
    types: Vec<TypeSpec>,
    properties: Vec<PropertySpec>,
    constructor: Option<ConstructorMapper>,
    hazards: Vec<HazardSpec>,
}

impl PropertyRule {
    /// Creates an empty rule named `name`.
    ///
    /// The name identifies the rule in findings and skip records.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            properties: Vec::new(),
            constructor: None,
            hazards: Vec::new(),
        }
    }

    /// Adds a type pattern: constructions of matching types are tracked.
    #[must_use]
    pub fn track_type(mut self, ty: TypeSpec) -> Self {
        self.types.push(ty);
        self
    }

    /// Adds a property slot driven by literal assignments to `field`.
    ///
    /// Slots are numbered in declaration order; mappers and evaluators
    /// see them in that order. A non-literal assignment to the field
    /// always degrades the slot to [`PropertyValue::Unknown`] - the
    /// mapper only sees values the analysis can actually read.
    #[must_use]
    pub fn property(
        mut self,
        field: impl Into<String>,
        mapper: impl Fn(&Literal) -> PropertyValue + Send + Sync + 'static,
    ) -> Self {
        self.properties.push(PropertySpec {
            field: field.into(),
            mapper: Arc::new(mapper),
        });
        self
    }

    /// Adds a property slot driven by boolean assignments to `field`.
    ///
    /// `true` maps to `when_true`, `false` to `when_false`; non-boolean
    /// literals read as `Unknown`.
    #[must_use]
    pub fn property_bool(
        self,
        field: impl Into<String>,
        when_true: PropertyValue,
        when_false: PropertyValue,
    ) -> Self {
        self.property(field, move |literal| match literal {
            Literal::Bool(true) => when_true,
            Literal::Bool(false) => when_false,
            _ => PropertyValue::Unknown,
        })
    }

    /// Sets the constructor-mapper deciding a fresh object's values.
    ///
    /// Without one, every slot starts [`PropertyValue::Unflagged`]:
    /// construction is assumed safe until the rule says otherwise.
    #[must_use]
    pub fn constructor(
        mut self,
        mapper: impl Fn(&[Option<&Literal>]) -> PropertyValues + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Arc::new(mapper));
        self
    }

    /// Sets fixed initial values, ignoring constructor arguments.
    ///
    /// Shorthand for a [`constructor`](Self::constructor) mapper that
    /// rules with hazardous defaults reach for.
    #[must_use]
    pub fn initial(self, values: Vec<PropertyValue>) -> Self {
        let initial = PropertyValues::from(values);
        self.constructor(move |_| initial.clone())
    }

    /// Adds a hazard: calls matching `callee` classify any tracked
    /// argument's property vector through `evaluator`.
    #[must_use]
    pub fn hazard(
        mut self,
        callee: CalleeSpec,
        evaluator: impl Fn(&PropertyValues) -> Classification + Send + Sync + 'static,
    ) -> Self {
        self.hazards.push(HazardSpec {
            callee,
            position: None,
            evaluator: Arc::new(evaluator),
        });
        self
    }

    /// Adds a hazard watching only the argument at `position`.
    #[must_use]
    pub fn hazard_arg(
        mut self,
        callee: CalleeSpec,
        position: u16,
        evaluator: impl Fn(&PropertyValues) -> Classification + Send + Sync + 'static,
    ) -> Self {
        self.hazards.push(HazardSpec {
            callee,
            position: Some(position),
            evaluator: Arc::new(evaluator),
        });
        self
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the rule's names against `module`.
    ///
    /// Returns `None` when the rule cannot fire there: no tracked type
    /// resolved, or no hazard callee resolved. A property whose field
    /// name never interned keeps its slot (so indices stay stable for
    /// the mappers) but no store can ever drive it.
    #[must_use]
    pub fn resolve(&self, module: &Module) -> Option<ResolvedPropertyRule> {
        let types = resolve_types(&self.types, module);
        let properties: Vec<ResolvedProperty> = self
            .properties
            .iter()
            .map(|spec| {
                let field = module.field_by_name(&spec.field);
                if field.is_none() {
                    debug!(
                        "rule {}: property field {:?} not interned; slot stays inert",
                        self.name, spec.field
                    );
                }
                ResolvedProperty {
                    field,
                    mapper: Arc::clone(&spec.mapper),
                }
            })
            .collect();
        let hazards: Vec<ResolvedHazard> = self
            .hazards
            .iter()
            .filter_map(|spec| {
                Some(ResolvedHazard {
                    matcher: spec.callee.resolve(module)?,
                    position: spec.position,
                    evaluator: Arc::clone(&spec.evaluator),
                })
            })
            .collect();

        if types.is_empty() {
            debug!("rule {}: no tracked type resolved; rule skipped", self.name);
            return None;
        }
        if hazards.is_empty() {
            debug!("rule {}: no hazard resolved; rule skipped", self.name);
            return None;
        }
        let arity = properties.len();
        let constructor = self
            .constructor
            .clone()
            .unwrap_or_else(|| default_constructor(arity));
        Some(ResolvedPropertyRule {
            name: self.name.clone(),
            types,
            properties,
            constructor,
            hazards,
        })
    }
}

impl fmt::Debug for PropertyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRule")
            .field("name", &self.name)
            .field("types", &self.types)
            .field(
                "properties",
                &self.properties.iter().map(|p| &p.field).collect::<Vec<_>>(),
            )
            .field("hazards", &self.hazards.len())
            .finish_non_exhaustive()
    }
}

fn default_constructor(arity: usize) -> ConstructorMapper {
    Arc::new(move |_| PropertyValues::uniform(arity, PropertyValue::Unflagged))
}

pub(crate) struct ResolvedProperty {
    field: Option<FieldId>,
    mapper: LiteralMapper,
}

/// A hazard matcher with its watched position and evaluator.
pub(crate) struct ResolvedHazard {
    matcher: CalleeMatcher,
    position: Option<u16>,
    evaluator: HazardEvaluator,
}

impl ResolvedHazard {
    /// Returns `true` if the argument at `position` is watched.
    pub(crate) fn covers_position(&self, position: u16) -> bool {
        self.position.is_none_or(|watched| watched == position)
    }

    /// Classifies a tracked argument's property vector.
    pub(crate) fn classify(&self, values: &PropertyValues) -> Classification {
        (self.evaluator)(values)
    }
}

/// A [`PropertyRule`] with its names interned against one module.
pub struct ResolvedPropertyRule {
    name: String,
    types: Vec<TypeMatcher>,
    properties: Vec<ResolvedProperty>,
    constructor: ConstructorMapper,
    hazards: Vec<ResolvedHazard>,
}

impl ResolvedPropertyRule {
    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of property slots the rule tracks.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if constructions of `ty` are tracked.
    pub(crate) fn tracks_type(&self, module: &Module, ty: TypeId) -> bool {
        any_type(&self.types, module, ty)
    }

    /// Initial property values for a construction with these literal
    /// arguments. The mapper's output is forced to the rule's arity.
    pub(crate) fn initial_values(&self, args: &[Option<&Literal>]) -> PropertyValues {
        (self.constructor)(args).with_arity(self.arity())
    }

    /// The slots driven by stores to `field`, with their mappers.
    pub(crate) fn mapped_slots(
        &self,
        field: FieldId,
    ) -> impl Iterator<Item = (usize, &LiteralMapper)> {
        self.properties
            .iter()
            .enumerate()
            .filter(move |(_, prop)| prop.field == Some(field))
            .map(|(slot, prop)| (slot, &prop.mapper))
    }

    /// The hazards matching a call to `callee`.
    pub(crate) fn matching_hazards<'a>(
        &'a self,
        module: &'a Module,
        callee: Callee,
    ) -> impl Iterator<Item = &'a ResolvedHazard> {
        self.hazards
            .iter()
            .filter(move |hazard| hazard.matcher.matches(module, callee))
    }
}

impl fmt::Debug for ResolvedPropertyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPropertyRule")
            .field("name", &self.name)
            .field("types", &self.types)
            .field("arity", &self.properties.len())
            .field("hazards", &self.hazards.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ModuleBuilder;
    use PropertyValue::{Flagged, MaybeFlagged, Unflagged, Unknown};

    fn module_with_cookie() -> Module {
        let mut mb = ModuleBuilder::new();
        mb.ty("Cookie");
        mb.field("Secure");
        mb.external("Response.AddCookie");
        let mut f = mb.start_function("main");
        f.ret(None);
        mb.finish_function(f).unwrap();
        mb.finish().unwrap()
    }

    fn cookie_rule() -> PropertyRule {
        PropertyRule::new("insecure-cookie")
            .track_type(TypeSpec::named("Cookie"))
            .property_bool("Secure", Unflagged, Flagged)
            .initial(vec![Flagged])
            .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case)
    }

    #[test]
    fn test_resolves_against_module() {
        let module = module_with_cookie();
        let rule = cookie_rule().resolve(&module).unwrap();

        assert_eq!(rule.name(), "insecure-cookie");
        assert_eq!(rule.arity(), 1);
        let cookie = module.type_by_name("Cookie").unwrap();
        assert!(rule.tracks_type(&module, cookie));

        let sink = Callee::External(module.symbol_by_name("Response.AddCookie").unwrap());
        assert_eq!(rule.matching_hazards(&module, sink).count(), 1);
    }

    #[test]
    fn test_unresolvable_rules_are_dropped() {
        let module = module_with_cookie();

        let no_type = PropertyRule::new("r")
            .track_type(TypeSpec::named("NoSuchType"))
            .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case);
        assert!(no_type.resolve(&module).is_none());

        let no_hazard = PropertyRule::new("r")
            .track_type(TypeSpec::named("Cookie"))
            .hazard(CalleeSpec::symbol("Never.Interned"), worst_case);
        assert!(no_hazard.resolve(&module).is_none());
    }

    #[test]
    fn test_unresolved_field_keeps_its_slot() {
        let module = module_with_cookie();
        let rule = PropertyRule::new("r")
            .track_type(TypeSpec::named("Cookie"))
            .property_bool("Missing", Flagged, Unflagged)
            .property_bool("Secure", Unflagged, Flagged)
            .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case)
            .resolve(&module)
            .unwrap();

        // Slot 0 is inert but still occupies its index; Secure is slot 1.
        assert_eq!(rule.arity(), 2);
        let secure = module.field_by_name("Secure").unwrap();
        let slots: Vec<usize> = rule.mapped_slots(secure).map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![1]);
    }

    #[test]
    fn test_default_constructor_is_all_unflagged() {
        let module = module_with_cookie();
        let rule = PropertyRule::new("r")
            .track_type(TypeSpec::named("Cookie"))
            .property_bool("Secure", Unflagged, Flagged)
            .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case)
            .resolve(&module)
            .unwrap();

        let values = rule.initial_values(&[]);
        assert_eq!(values.values(), &[Unflagged]);
    }

    #[test]
    fn test_constructor_mapper_sees_literals() {
        let module = module_with_cookie();
        let rule = PropertyRule::new("r")
            .track_type(TypeSpec::named("Cookie"))
            .property_bool("Secure", Unflagged, Flagged)
            .constructor(|args| {
                // Argument 0 is the secure flag when present.
                let value = match args.first() {
                    Some(Some(Literal::Bool(true))) => Unflagged,
                    Some(Some(Literal::Bool(false))) => Flagged,
                    _ => Unknown,
                };
                PropertyValues::from(vec![value])
            })
            .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case)
            .resolve(&module)
            .unwrap();

        let secure = Literal::Bool(true);
        assert_eq!(rule.initial_values(&[Some(&secure)]).get(0), Unflagged);
        assert_eq!(rule.initial_values(&[None]).get(0), Unknown);
    }

    #[test]
    fn test_worst_case_classifier() {
        let flagged = PropertyValues::from(vec![Unflagged, Flagged]);
        assert_eq!(worst_case(&flagged), Classification::Flagged);

        let maybe = PropertyValues::from(vec![Unflagged, MaybeFlagged]);
        assert_eq!(worst_case(&maybe), Classification::MaybeFlagged);

        let opaque = PropertyValues::from(vec![Unknown]);
        assert_eq!(worst_case(&opaque), Classification::MaybeFlagged);

        let clean = PropertyValues::from(vec![Unflagged, Unflagged]);
        assert_eq!(worst_case(&clean), Classification::Unflagged);

        assert_eq!(worst_case(&PropertyValues::from(vec![])), Classification::Unflagged);
    }

    #[test]
    fn test_positional_hazard() {
        let module = module_with_cookie();
        let rule = PropertyRule::new("r")
            .track_type(TypeSpec::named("Cookie"))
            .hazard_arg(CalleeSpec::symbol("Response.AddCookie"), 1, worst_case)
            .resolve(&module)
            .unwrap();

        let sink = Callee::External(module.symbol_by_name("Response.AddCookie").unwrap());
        let hazard = rule.matching_hazards(&module, sink).next().unwrap();
        assert!(!hazard.covers_position(0));
        assert!(hazard.covers_position(1));
    }
}
