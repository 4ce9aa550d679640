//! The extensible effect row algebra `E` (§3, §4.1).
//!
//! A row rather than a flat set: `empty`, `label`, `row(head, tail)`,
//! `var(id)`, `unknown`, admitting a fresh effect-variable for
//! unification and commuting under reordering, in the style of
//! `EffectRow`/`row_var` polymorphism.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::types::VarId;

/// Closed set of effect labels (§3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Label {
    Io,
    File,
    Network,
    Process,
    State,
    Ets,
    Time,
    Random,
    /// Placeholder meaning "inherits from lambda argument".
    Lambda,
    /// Reads environment: clock, env-vars, PID.
    Dependent,
    /// Opaque native call.
    Nif,
    /// May raise; the kind list is a set of exception-type names, possibly
    /// a single `"dynamic"` entry.
    Exn(BTreeSet<String>),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Io => write!(f, "io"),
            Label::File => write!(f, "file"),
            Label::Network => write!(f, "network"),
            Label::Process => write!(f, "process"),
            Label::State => write!(f, "state"),
            Label::Ets => write!(f, "ets"),
            Label::Time => write!(f, "time"),
            Label::Random => write!(f, "random"),
            Label::Lambda => write!(f, "lambda"),
            Label::Dependent => write!(f, "dependent"),
            Label::Nif => write!(f, "nif"),
            Label::Exn(kinds) => write!(f, "exn({})", kinds.iter().cloned().collect::<Vec<_>>().join(",")),
        }
    }
}

impl Label {
    /// A payload site: `Module.function/arity`, recorded against `s`/`d`
    /// compact tokens for the "leaf side-effect sites" annotation.
    pub fn is_side_effecting(&self) -> bool {
        matches!(
            self,
            Label::Io | Label::File | Label::Network | Label::Process | Label::State | Label::Ets | Label::Random
        )
    }
}

/// A fully-qualified call site, used as the payload of `s`/`d` compact
/// tokens: `Module.function/arity`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Mfa {
    pub module: String,
    pub function: String,
    pub arity: u32,
}

impl Mfa {
    pub fn new(module: impl Into<String>, function: impl Into<String>, arity: u32) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            arity: arity.into(),
        }
    }
}

impl fmt::Display for Mfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.module, self.function, self.arity)
    }
}

/// The effect row itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Empty,
    Label(Label, Option<Mfa>),
    Row { head: Box<Effect>, tail: Box<Effect> },
    Var(VarId),
    Unknown,
}

impl Effect {
    pub fn empty() -> Self {
        Effect::Empty
    }

    pub fn single(label: Label) -> Self {
        Effect::Label(label, None)
    }

    pub fn single_with_site(label: Label, site: Mfa) -> Self {
        Effect::Label(label, Some(site))
    }

    pub fn var(id: VarId) -> Self {
        Effect::Var(id)
    }

    pub fn unknown() -> Self {
        Effect::Unknown
    }

    /// `extend(label, tail) -> row`.
    pub fn extend(head: Effect, tail: Effect) -> Self {
        if matches!(tail, Effect::Empty) {
            return head;
        }
        Effect::Row {
            head: Box::new(head),
            tail: Box::new(tail),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Effect::Empty)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Effect::Unknown)
    }

    /// Flatten a row into its constituent atoms (labels / vars / unknown),
    /// in left-to-right order. `extract_labels` from §4.1.
    pub fn flatten(&self) -> Vec<&Effect> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a Effect>) {
        match self {
            Effect::Empty => {}
            Effect::Row { head, tail } => {
                head.flatten_into(out);
                tail.flatten_into(out);
            }
            other => out.push(other),
        }
    }

    pub fn extract_labels(&self) -> Vec<&Label> {
        self.flatten()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Label(l, _) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn free_variables(&self) -> BTreeSet<VarId> {
        let mut out = BTreeSet::new();
        self.collect_free_variables(&mut out);
        out
    }

    pub(crate) fn collect_free_variables(&self, out: &mut BTreeSet<VarId>) {
        match self {
            Effect::Empty | Effect::Unknown | Effect::Label(_, _) => {}
            Effect::Var(id) => {
                out.insert(*id);
            }
            Effect::Row { head, tail } => {
                head.collect_free_variables(out);
                tail.collect_free_variables(out);
            }
        }
    }

    /// `combine(a, b)`: severity-max conservative join of two effect rows,
    /// used wherever the synthesis rules say "combine arg effects in
    /// order" or "combine via severity". Preserves the full row (does not
    /// collapse to compact form) except that `unknown` absorbs everything.
    pub fn combine(&self, other: &Effect) -> Effect {
        match (self, other) {
            (Effect::Unknown, _) | (_, Effect::Unknown) => Effect::Unknown,
            (Effect::Empty, e) => e.clone(),
            (e, Effect::Empty) => e.clone(),
            (a, b) => Effect::Row {
                head: Box::new(a.clone()),
                tail: Box::new(b.clone()),
            },
        }
    }

    pub fn combine_many<I: IntoIterator<Item = Effect>>(effects: I) -> Effect {
        effects.into_iter().fold(Effect::Empty, |acc, e| acc.combine(&e))
    }

    /// `to_compact(e) -> compact_token` (§3).
    pub fn to_compact(&self) -> CompactEffect {
        if self.is_unknown() {
            return CompactEffect::Unknown;
        }
        let atoms = self.flatten();
        if atoms.is_empty() {
            return CompactEffect::Pure;
        }

        let mut sites: BTreeSet<Mfa> = BTreeSet::new();
        let mut exn_kinds: BTreeSet<String> = BTreeSet::new();
        let mut has_side_effect = false;
        let mut has_dependent = false;
        let mut has_nif = false;
        let mut has_lambda = false;
        let mut has_exn = false;
        let mut has_unknown = false;

        for atom in atoms {
            match atom {
                Effect::Unknown => has_unknown = true,
                Effect::Var(_) => {}
                Effect::Label(label, site) => match label {
                    Label::Nif => has_nif = true,
                    Label::Dependent => has_dependent = true,
                    Label::Lambda => has_lambda = true,
                    Label::Exn(kinds) => {
                        has_exn = true;
                        exn_kinds.extend(kinds.iter().cloned());
                        if let Some(s) = site {
                            sites.insert(s.clone());
                        }
                    }
                    other if other.is_side_effecting() => {
                        has_side_effect = true;
                        if let Some(s) = site {
                            sites.insert(s.clone());
                        }
                    }
                    _ => {}
                },
                Effect::Empty | Effect::Row { .. } => unreachable!("flatten() never yields these"),
            }
        }

        // Severity order: u > n > s > d > e > l > p.
        if has_unknown {
            CompactEffect::Unknown
        } else if has_nif {
            CompactEffect::Nif
        } else if has_side_effect {
            CompactEffect::SideEffecting(sites)
        } else if has_dependent {
            CompactEffect::Dependent(sites)
        } else if has_exn {
            CompactEffect::Exception(exn_kinds)
        } else if has_lambda {
            CompactEffect::LambdaDependent
        } else {
            CompactEffect::Pure
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Empty => write!(f, "empty"),
            Effect::Unknown => write!(f, "unknown"),
            Effect::Var(id) => write!(f, "e{id}"),
            Effect::Label(l, _) => write!(f, "{l}"),
            Effect::Row { head, tail } => write!(f, "{head}, {tail}"),
        }
    }
}

/// Severity rank used to combine/compare compact tokens: higher is more
/// severe. `u > n > s > d > e > l > p`.
fn severity_rank(c: &CompactEffect) -> u8 {
    match c {
        CompactEffect::Unknown => 6,
        CompactEffect::Nif => 5,
        CompactEffect::SideEffecting(_) => 4,
        CompactEffect::Dependent(_) => 3,
        CompactEffect::Exception(_) => 2,
        CompactEffect::LambdaDependent => 1,
        CompactEffect::Pure => 0,
    }
}

/// The one-token (or small tagged record) summary of a full effect row,
/// used for registry storage and reporting (§3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompactEffect {
    Pure,
    SideEffecting(BTreeSet<Mfa>),
    Dependent(BTreeSet<Mfa>),
    Exception(BTreeSet<String>),
    LambdaDependent,
    Nif,
    Unknown,
}

impl CompactEffect {
    pub fn severity(&self) -> u8 {
        severity_rank(self)
    }

    /// Monotone, severity-max combination of two compact tokens — the
    /// per-round update rule the fixpoint driver relies on to guarantee
    /// non-decreasing severity (§3 invariant 2, §8 property 2).
    pub fn combine(&self, other: &CompactEffect) -> CompactEffect {
        use CompactEffect::*;
        match (self.severity().cmp(&other.severity()), self, other) {
            (std::cmp::Ordering::Greater, s, _) => s.clone(),
            (std::cmp::Ordering::Less, _, o) => o.clone(),
            (std::cmp::Ordering::Equal, SideEffecting(a), SideEffecting(b)) => {
                SideEffecting(a.union(b).cloned().collect())
            }
            (std::cmp::Ordering::Equal, Dependent(a), Dependent(b)) => Dependent(a.union(b).cloned().collect()),
            (std::cmp::Ordering::Equal, Exception(a), Exception(b)) => Exception(a.union(b).cloned().collect()),
            (std::cmp::Ordering::Equal, s, _) => s.clone(),
        }
    }

    /// Single-character token for the seed/generated/explicit registry
    /// files (§6); structured variants round-trip through
    /// `to_compact`/`from_compact` instead of a bare letter (see
    /// `registry::entry` for the JSON descriptor shape).
    pub fn letter(&self) -> char {
        match self {
            CompactEffect::Pure => 'p',
            CompactEffect::SideEffecting(_) => 's',
            CompactEffect::Dependent(_) => 'd',
            CompactEffect::Exception(_) => 'e',
            CompactEffect::LambdaDependent => 'l',
            CompactEffect::Nif => 'n',
            CompactEffect::Unknown => 'u',
        }
    }

    pub fn from_letter_and_payload(letter: char, sites: BTreeSet<Mfa>, exn_kinds: BTreeSet<String>) -> Option<Self> {
        Some(match letter {
            'p' => CompactEffect::Pure,
            's' => CompactEffect::SideEffecting(sites),
            'd' => CompactEffect::Dependent(sites),
            'e' => CompactEffect::Exception(exn_kinds),
            'l' => CompactEffect::LambdaDependent,
            'n' => CompactEffect::Nif,
            'u' => CompactEffect::Unknown,
            _ => return None,
        })
    }

    /// `from_compact` counterpart used by the round-trip law in §8:
    /// reconstructs a (non-canonical but equivalent) `Effect` row from a
    /// compact token.
    pub fn to_effect(&self) -> Effect {
        match self {
            CompactEffect::Pure => Effect::Empty,
            CompactEffect::LambdaDependent => Effect::single(Label::Lambda),
            CompactEffect::Nif => Effect::single(Label::Nif),
            CompactEffect::Unknown => Effect::Unknown,
            CompactEffect::Exception(kinds) => Effect::single(Label::Exn(kinds.clone())),
            CompactEffect::SideEffecting(sites) | CompactEffect::Dependent(sites) => {
                let label = if matches!(self, CompactEffect::Dependent(_)) {
                    Label::Dependent
                } else {
                    Label::Io
                };
                if sites.is_empty() {
                    Effect::single(label)
                } else {
                    Effect::combine_many(sites.iter().cloned().map(|s| Effect::single_with_site(label.clone(), s)))
                }
            }
        }
    }
}

impl fmt::Display for CompactEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_matches_spec() {
        let order = [
            CompactEffect::Pure,
            CompactEffect::LambdaDependent,
            CompactEffect::Exception(BTreeSet::new()),
            CompactEffect::Dependent(BTreeSet::new()),
            CompactEffect::SideEffecting(BTreeSet::new()),
            CompactEffect::Nif,
            CompactEffect::Unknown,
        ];
        for w in order.windows(2) {
            assert!(w[0].severity() < w[1].severity(), "{:?} should be < {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn combine_is_severity_max_and_unions_payload() {
        let a = CompactEffect::SideEffecting(BTreeSet::from([Mfa::new("File", "write", 2)]));
        let b = CompactEffect::SideEffecting(BTreeSet::from([Mfa::new("Net", "send", 2)]));
        let combined = a.combine(&b);
        match combined {
            CompactEffect::SideEffecting(sites) => assert_eq!(sites.len(), 2),
            other => panic!("expected SideEffecting, got {other:?}"),
        }
    }

    #[test]
    fn unknown_absorbs_everything() {
        let pure = CompactEffect::Pure;
        let unknown = CompactEffect::Unknown;
        assert_eq!(pure.combine(&unknown), CompactEffect::Unknown);
        assert_eq!(unknown.combine(&pure), CompactEffect::Unknown);
    }

    #[test]
    fn pure_expression_has_empty_effect() {
        let e = Effect::combine_many(vec![Effect::empty(), Effect::empty()]);
        assert!(e.is_empty());
        assert_eq!(e.to_compact(), CompactEffect::Pure);
    }

    #[test]
    fn to_compact_picks_most_severe_label() {
        let row = Effect::extend(
            Effect::single(Label::Io),
            Effect::extend(Effect::single(Label::Exn(BTreeSet::from(["ArgumentError".to_string()]))), Effect::empty()),
        );
        assert_eq!(row.to_compact(), CompactEffect::SideEffecting(BTreeSet::new()));
    }
}
