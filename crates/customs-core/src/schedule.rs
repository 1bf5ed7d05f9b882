//! # Charge Schedule
//!
//! The injected duty/tax schedule and the resolver that picks the rules
//! applying to one request.
//!
//! ## Schedule Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Charge order (precedence)   Variants (one per code pattern)            │
//! │  ─────────────────────────   ─────────────────────────────────────────  │
//! │  1. ID-01   base CIF          "*" 20%    "8703*" 30%   "8703.23.10" 40% │
//! │  2. SCF90   base CIF          "*" 0.3%                                  │
//! │  3. ASD05   base CIF + ID-01  "2203*" 5%                                │
//! │  4. CAF     base CIF          personal: tiered   commercial: J$10,000   │
//! │  5. GCT     base CIF + ID-01 + SCF90 + ASD05 + CAF     "*" 15%          │
//! │                                                                         │
//! │  resolve("8703.23.10", commercial, general)                             │
//! │    ID-01 → 40% (exact beats prefix beats any)                           │
//! │    ASD05 → no variant matches, dropped; GCT's base loses ASD05          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A schedule is validated once when it is built. Forward references,
//! self-references and ambiguous variants are rejected there, so a
//! published schedule can only fail at resolve time on a tie between two
//! equally specific variants.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ClassificationCode, PackageType, TransactionType};

/// Reserved accumulator key holding the CIF value.
pub const CIF_KEY: &str = "CIF";

// =============================================================================
// Charge Amount
// =============================================================================

/// One threshold of a tiered fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    /// Applies when CIF in the reference currency is strictly below this.
    pub below_reference: Money,
    /// Fee in local currency.
    pub amount: Money,
}

/// How a charge's line amount is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ChargeAmount {
    /// Ad-valorem rate as a fraction of the base (0.15 = 15%).
    Rate(Decimal),
    /// Fixed fee in local currency, independent of the base.
    Fixed(Money),
    /// Fixed fee in local currency chosen by CIF in the reference currency.
    Tiered {
        thresholds: Vec<FeeTier>,
        otherwise: Money,
    },
}

impl ChargeAmount {
    /// The applied rate, `None` for fixed and tiered fees.
    pub fn applied_rate(&self) -> Option<Decimal> {
        match self {
            ChargeAmount::Rate(rate) => Some(*rate),
            ChargeAmount::Fixed(_) | ChargeAmount::Tiered { .. } => None,
        }
    }

    /// The fee for fixed and tiered amounts, `None` for rates.
    pub fn fixed_fee(&self, cif_reference: Money) -> Option<Money> {
        match self {
            ChargeAmount::Rate(_) => None,
            ChargeAmount::Fixed(fee) => Some(*fee),
            ChargeAmount::Tiered {
                thresholds,
                otherwise,
            } => Some(
                thresholds
                    .iter()
                    .find(|tier| cif_reference < tier.below_reference)
                    .map(|tier| tier.amount)
                    .unwrap_or(*otherwise),
            ),
        }
    }

    fn validate(&self, rule: &str) -> CoreResult<()> {
        let invalid = |reason: &str| {
            Err(CoreError::InvalidConfiguration(format!(
                "charge '{}': {}",
                rule, reason
            )))
        };
        match self {
            ChargeAmount::Rate(rate) if rate.is_sign_negative() => invalid("rate must not be negative"),
            ChargeAmount::Fixed(fee) if fee.is_negative() => invalid("fee must not be negative"),
            ChargeAmount::Tiered {
                thresholds,
                otherwise,
            } => {
                if otherwise.is_negative() || thresholds.iter().any(|t| t.amount.is_negative()) {
                    return invalid("tier fees must not be negative");
                }
                if thresholds
                    .windows(2)
                    .any(|pair| pair[0].below_reference >= pair[1].below_reference)
                {
                    return invalid("tier thresholds must be strictly ascending");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Parses a rate as written in a published tariff schedule.
///
/// ## Accepted Forms
/// ```text
/// "20%"        → Rate(0.20)
/// "0.2"        → Rate(0.2)
/// "20"         → Rate(0.20)     numbers above 1 are percentages
/// "$38.3198"   → Fixed(38.3198)
/// "J$2,500"    → Fixed(2500)
/// "-", "", "no data", "nan", "b"  → Rate(0)
/// "$0.75 per litre"               → InvalidConfiguration (needs a quantity)
/// ```
pub fn parse_rate_text(text: &str) -> CoreResult<ChargeAmount> {
    let normalized: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let invalid = || CoreError::InvalidConfiguration(format!("unrecognized rate '{}'", text.trim()));

    if matches!(normalized.as_str(), "" | "-" | "nodata" | "nan" | "b") {
        return Ok(ChargeAmount::Rate(Decimal::ZERO));
    }
    if normalized.contains("per") {
        return Err(CoreError::InvalidConfiguration(format!(
            "per-unit duty '{}' needs a quantity",
            text.trim()
        )));
    }

    let parse_number = |s: &str| -> CoreResult<Decimal> {
        let value = Decimal::from_str(&s.replace(',', "")).map_err(|_| invalid())?;
        if value.is_sign_negative() {
            return Err(invalid());
        }
        Ok(value)
    };

    if let Some(idx) = normalized.rfind('$') {
        let fee = parse_number(&normalized[idx + 1..])?;
        return Ok(ChargeAmount::Fixed(Money::from_decimal(fee)));
    }
    if let Some(percent) = normalized.strip_suffix('%') {
        return Ok(ChargeAmount::Rate(parse_number(percent)? / Decimal::ONE_HUNDRED));
    }

    let value = parse_number(&normalized)?;
    if value > Decimal::ONE {
        Ok(ChargeAmount::Rate(value / Decimal::ONE_HUNDRED))
    } else {
        Ok(ChargeAmount::Rate(value))
    }
}

// =============================================================================
// Base Selector
// =============================================================================

/// One term of a taxable base.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseComponent {
    Cif,
    Charge(String),
}

impl BaseComponent {
    /// The accumulator key this component reads.
    pub fn key(&self) -> &str {
        match self {
            BaseComponent::Cif => CIF_KEY,
            BaseComponent::Charge(name) => name,
        }
    }
}

/// Which accumulator entries compose a rule's taxable base.
///
/// Text form: `"CIF"`, `"CIF + ID-01 + SCF90"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BaseSelector(Vec<BaseComponent>);

impl BaseSelector {
    /// The plain CIF base.
    pub fn cif() -> Self {
        BaseSelector(vec![BaseComponent::Cif])
    }

    /// CIF plus the named charges.
    pub fn cif_plus<I, S>(charges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut components = vec![BaseComponent::Cif];
        components.extend(charges.into_iter().map(|c| BaseComponent::Charge(c.into())));
        BaseSelector(components)
    }

    pub fn parse(text: &str) -> CoreResult<Self> {
        if text.trim().is_empty() {
            return Ok(BaseSelector::cif());
        }
        let mut components = Vec::new();
        for term in text.split('+').map(str::trim) {
            if term.is_empty() {
                return Err(CoreError::InvalidConfiguration(format!(
                    "empty term in base selector '{}'",
                    text
                )));
            }
            let component = if term.eq_ignore_ascii_case(CIF_KEY) {
                BaseComponent::Cif
            } else {
                BaseComponent::Charge(term.to_string())
            };
            if components.contains(&component) {
                return Err(CoreError::InvalidConfiguration(format!(
                    "'{}' appears twice in base selector '{}'",
                    term, text
                )));
            }
            components.push(component);
        }
        Ok(BaseSelector(components))
    }

    pub fn components(&self) -> &[BaseComponent] {
        &self.0
    }

    /// Names of the charges (not CIF) this base reads.
    pub fn charge_references(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|c| match c {
            BaseComponent::Charge(name) => Some(name.as_str()),
            BaseComponent::Cif => None,
        })
    }

    /// Keeps only CIF and the charges `keep` accepts.
    fn retain_charges(&self, keep: impl Fn(&str) -> bool) -> Self {
        BaseSelector(
            self.0
                .iter()
                .filter(|c| match c {
                    BaseComponent::Cif => true,
                    BaseComponent::Charge(name) => keep(name),
                })
                .cloned()
                .collect(),
        )
    }

    /// Rewrites every charge reference through `rename`.
    fn rename_charges(&mut self, rename: impl Fn(&str) -> Option<String>) {
        for component in &mut self.0 {
            if let BaseComponent::Charge(name) = component {
                if let Some(canonical) = rename(name) {
                    *name = canonical;
                }
            }
        }
    }
}

impl fmt::Display for BaseSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.0.iter().map(BaseComponent::key).collect();
        f.write_str(&keys.join(" + "))
    }
}

impl TryFrom<String> for BaseSelector {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BaseSelector::parse(&value)
    }
}

impl From<BaseSelector> for String {
    fn from(selector: BaseSelector) -> Self {
        selector.to_string()
    }
}

// =============================================================================
// Applies-When Predicate
// =============================================================================

/// Classification-code pattern of a rule variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CodePattern {
    /// `"*"`
    Any,
    /// `"8703*"` or `"8703.23*"` (digits only, dots ignored)
    Prefix(String),
    /// `"8703.23.10"` (digits only, dots ignored)
    Exact(String),
}

impl CodePattern {
    pub fn matches(&self, code: &ClassificationCode) -> bool {
        match self {
            CodePattern::Any => true,
            CodePattern::Prefix(prefix) => code.digits().starts_with(prefix.as_str()),
            CodePattern::Exact(digits) => code.digits() == digits,
        }
    }

    /// Higher is more specific: exact > longer prefix > shorter prefix > any.
    fn specificity(&self) -> (u8, usize) {
        match self {
            CodePattern::Any => (0, 0),
            CodePattern::Prefix(prefix) => (1, prefix.len()),
            CodePattern::Exact(digits) => (2, digits.len()),
        }
    }
}

impl FromStr for CodePattern {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text == "*" || text.is_empty() {
            return Ok(CodePattern::Any);
        }
        let (body, is_prefix) = match text.strip_suffix('*') {
            Some(body) => (body.trim_end_matches('.'), true),
            None => (text, false),
        };
        let digits: String = body.chars().filter(|c| *c != '.').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::InvalidConfiguration(format!(
                "invalid classification pattern '{}'",
                text
            )));
        }
        Ok(if is_prefix {
            CodePattern::Prefix(digits)
        } else {
            CodePattern::Exact(digits)
        })
    }
}

impl fmt::Display for CodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodePattern::Any => f.write_str("*"),
            CodePattern::Prefix(prefix) => write!(f, "{}*", prefix),
            CodePattern::Exact(digits) => f.write_str(digits),
        }
    }
}

impl TryFrom<String> for CodePattern {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CodePattern> for String {
    fn from(pattern: CodePattern) -> Self {
        pattern.to_string()
    }
}

/// When a rule variant applies. Empty type lists mean "any".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliesWhen {
    pub code: CodePattern,
    #[serde(default)]
    pub transaction_types: Vec<TransactionType>,
    #[serde(default)]
    pub package_types: Vec<PackageType>,
}

impl AppliesWhen {
    /// Matches every request.
    pub fn always() -> Self {
        AppliesWhen {
            code: CodePattern::Any,
            transaction_types: Vec::new(),
            package_types: Vec::new(),
        }
    }

    pub fn code(pattern: CodePattern) -> Self {
        AppliesWhen {
            code: pattern,
            ..AppliesWhen::always()
        }
    }

    pub fn matches(
        &self,
        code: &ClassificationCode,
        transaction_type: TransactionType,
        package_type: PackageType,
    ) -> bool {
        self.code.matches(code)
            && (self.transaction_types.is_empty()
                || self.transaction_types.contains(&transaction_type))
            && (self.package_types.is_empty() || self.package_types.contains(&package_type))
    }

    fn specificity(&self) -> (u8, usize, usize) {
        let (rank, len) = self.code.specificity();
        let filters =
            usize::from(!self.transaction_types.is_empty()) + usize::from(!self.package_types.is_empty());
        (rank, len, filters)
    }

    /// Whether some request could match both predicates with equal specificity.
    fn collides_with(&self, other: &AppliesWhen) -> bool {
        fn overlap<T: PartialEq>(a: &[T], b: &[T]) -> bool {
            a.is_empty() || b.is_empty() || a.iter().any(|x| b.contains(x))
        }
        self.code == other.code
            && self.specificity() == other.specificity()
            && overlap(&self.transaction_types, &other.transaction_types)
            && overlap(&self.package_types, &other.package_types)
    }
}

// =============================================================================
// Charge Rule
// =============================================================================

/// One variant of a named charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRule {
    pub name: String,
    pub amount: ChargeAmount,
    pub base: BaseSelector,
    pub applies_when: AppliesWhen,
    /// Position of the charge in the cascade; lower runs first.
    pub precedence: u32,
}

impl ChargeRule {
    /// A rule that applies to every request, at precedence 0.
    pub fn new(name: impl Into<String>, amount: ChargeAmount, base: BaseSelector) -> Self {
        ChargeRule {
            name: name.into(),
            amount,
            base,
            applies_when: AppliesWhen::always(),
            precedence: 0,
        }
    }

    pub fn with_precedence(mut self, precedence: u32) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn when(mut self, applies_when: AppliesWhen) -> Self {
        self.applies_when = applies_when;
        self
    }
}

// =============================================================================
// Charge Schedule
// =============================================================================

/// A validated, versioned set of charge rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeSchedule {
    version: u64,
    rules: Vec<ChargeRule>,
    /// Distinct charge names in cascade order.
    #[serde(skip)]
    charge_order: Vec<String>,
}

impl ChargeSchedule {
    /// Validates and builds a schedule.
    ///
    /// ## Errors
    /// - `CircularOrForwardBaseReference`: reserved name, self-reference,
    ///   reference to a later or undefined charge, colliding variants
    /// - `InvalidConfiguration`: variants of one charge disagree on base or
    ///   precedence, malformed amounts, two names differ only by case
    pub fn new(version: u64, mut rules: Vec<ChargeRule>) -> CoreResult<Self> {
        // Names are compared without case in the cascade, so each charge
        // keeps one trimmed spelling and base references adopt it.
        let mut spellings: HashMap<String, String> = HashMap::new();
        for rule in &mut rules {
            let name = rule.name.trim().to_string();
            if name.is_empty() {
                return Err(CoreError::InvalidConfiguration(
                    "charge rule name must not be empty".to_string(),
                ));
            }
            if name.eq_ignore_ascii_case(CIF_KEY) {
                return Err(CoreError::base_reference(
                    name,
                    CIF_KEY,
                    "CIF is the reserved accumulator key",
                ));
            }
            match spellings.get(&name.to_ascii_lowercase()) {
                Some(existing) if *existing != name => {
                    return Err(CoreError::InvalidConfiguration(format!(
                        "charge names '{}' and '{}' differ only by case",
                        existing, name
                    )));
                }
                Some(_) => {}
                None => {
                    spellings.insert(name.to_ascii_lowercase(), name.clone());
                }
            }
            rule.name = name;
        }
        for rule in &mut rules {
            rule.base
                .rename_charges(|r| spellings.get(&r.to_ascii_lowercase()).cloned());
        }

        let mut first_seen: HashMap<&str, (usize, &ChargeRule)> = HashMap::new();

        for (index, rule) in rules.iter().enumerate() {
            if rule.base.charge_references().any(|r| r == rule.name) {
                return Err(CoreError::base_reference(
                    &rule.name,
                    &rule.name,
                    "a charge cannot be part of its own base",
                ));
            }
            rule.amount.validate(&rule.name)?;

            match first_seen.get(rule.name.as_str()) {
                None => {
                    first_seen.insert(&rule.name, (index, rule));
                }
                Some((_, first)) => {
                    if first.base != rule.base || first.precedence != rule.precedence {
                        return Err(CoreError::InvalidConfiguration(format!(
                            "variants of charge '{}' must share base and precedence",
                            rule.name
                        )));
                    }
                }
            }
        }

        for (i, a) in rules.iter().enumerate() {
            for b in &rules[i + 1..] {
                if a.name == b.name && a.applies_when.collides_with(&b.applies_when) {
                    return Err(CoreError::base_reference(
                        &a.name,
                        &a.name,
                        format!("two variants match code pattern '{}' equally", a.applies_when.code),
                    ));
                }
            }
        }

        let mut charges: Vec<(u32, usize, &str)> = first_seen
            .iter()
            .map(|(name, (index, rule))| (rule.precedence, *index, *name))
            .collect();
        charges.sort();
        let charge_order: Vec<String> = charges.iter().map(|(_, _, n)| n.to_string()).collect();

        let mut defined: HashSet<&str> = HashSet::new();
        for name in &charge_order {
            let (_, rule) = first_seen[name.as_str()];
            for reference in rule.base.charge_references() {
                if !defined.contains(reference) {
                    let reason = if first_seen.contains_key(reference) {
                        "referenced charge runs later in the cascade"
                    } else {
                        "referenced charge is not defined"
                    };
                    return Err(CoreError::base_reference(name, reference, reason));
                }
            }
            defined.insert(name);
        }

        Ok(ChargeSchedule {
            version,
            rules,
            charge_order,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rules(&self) -> &[ChargeRule] {
        &self.rules
    }

    /// Charge names in cascade order.
    pub fn charge_names(&self) -> &[String] {
        &self.charge_order
    }

    /// Resolves the ordered rules that apply to one request.
    ///
    /// A code that matches no rule yields an empty list. Base references to
    /// charges that did not apply are dropped, since they contribute zero.
    pub fn resolve(
        &self,
        code: &ClassificationCode,
        transaction_type: TransactionType,
        package_type: PackageType,
    ) -> CoreResult<Vec<ChargeRule>> {
        let mut resolved: Vec<ChargeRule> = Vec::new();
        let mut applied: HashSet<&str> = HashSet::new();

        for name in &self.charge_order {
            let mut candidates: Vec<&ChargeRule> = self
                .rules
                .iter()
                .filter(|r| &r.name == name)
                .filter(|r| r.applies_when.matches(code, transaction_type, package_type))
                .collect();
            candidates.sort_by_key(|r| std::cmp::Reverse(r.applies_when.specificity()));

            let winner = match candidates.as_slice() {
                [] => continue,
                [only] => *only,
                [best, next, ..] => {
                    if best.applies_when.specificity() == next.applies_when.specificity() {
                        return Err(CoreError::base_reference(
                            name,
                            name,
                            format!("two variants match '{}' equally", code),
                        ));
                    }
                    *best
                }
            };

            let mut rule = winner.clone();
            rule.base = winner.base.retain_charges(|r| applied.contains(r));
            applied.insert(name);
            resolved.push(rule);
        }

        Ok(resolved)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> ClassificationCode {
        ClassificationCode::parse(s).unwrap()
    }

    fn rate(r: Decimal) -> ChargeAmount {
        ChargeAmount::Rate(r)
    }

    fn names(rules: &[ChargeRule]) -> Vec<&str> {
        rules.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_parse_rate_text() {
        assert_eq!(parse_rate_text("20%").unwrap(), rate(dec!(0.20)));
        assert_eq!(parse_rate_text("0.2").unwrap(), rate(dec!(0.2)));
        assert_eq!(parse_rate_text("20").unwrap(), rate(dec!(0.20)));
        assert_eq!(parse_rate_text("1").unwrap(), rate(dec!(1)));
        assert_eq!(parse_rate_text(" 2.5 % ").unwrap(), rate(dec!(0.025)));
        assert_eq!(
            parse_rate_text("$38.3198").unwrap(),
            ChargeAmount::Fixed(Money::from_decimal(dec!(38.3198)))
        );
        assert_eq!(
            parse_rate_text("J$2,500").unwrap(),
            ChargeAmount::Fixed(Money::from_decimal(dec!(2500)))
        );
        for empty in ["-", "", "No Data", "nan", "b"] {
            assert_eq!(parse_rate_text(empty).unwrap(), rate(Decimal::ZERO));
        }
    }

    #[test]
    fn test_parse_rate_text_rejects() {
        assert!(parse_rate_text("$0.75 per litre").is_err());
        assert!(parse_rate_text("twenty").is_err());
        assert!(parse_rate_text("-5%").is_err());
    }

    #[test]
    fn test_base_selector_text() {
        let base = BaseSelector::parse("CIF + ID-01 + SCF90").unwrap();
        assert_eq!(base.to_string(), "CIF + ID-01 + SCF90");
        assert_eq!(base.charge_references().collect::<Vec<_>>(), vec!["ID-01", "SCF90"]);
        assert_eq!(BaseSelector::parse("").unwrap(), BaseSelector::cif());
        assert!(BaseSelector::parse("CIF + + ID-01").is_err());
        assert!(BaseSelector::parse("CIF + cif").is_err());
    }

    #[test]
    fn test_code_pattern() {
        let exact: CodePattern = "8703.23.10".parse().unwrap();
        let prefix: CodePattern = "8703*".parse().unwrap();
        let any: CodePattern = "*".parse().unwrap();

        assert_eq!(exact, CodePattern::Exact("87032310".to_string()));
        assert_eq!(prefix.to_string(), "8703*");
        assert!(exact.matches(&code("870323.10")));
        assert!(!exact.matches(&code("87032311")));
        assert!(prefix.matches(&code("8703.23.10")));
        assert!(!prefix.matches(&code("8704.10")));
        assert!(any.matches(&code("0101")));
        assert!("87a3*".parse::<CodePattern>().is_err());
    }

    #[test]
    fn test_tiered_fee_selection() {
        let caf = ChargeAmount::Tiered {
            thresholds: vec![FeeTier {
                below_reference: Money::from_decimal(dec!(5000)),
                amount: Money::from_decimal(dec!(2500)),
            }],
            otherwise: Money::from_decimal(dec!(10000)),
        };
        assert_eq!(caf.fixed_fee(Money::from_decimal(dec!(4999.99))).unwrap().amount(), dec!(2500));
        assert_eq!(caf.fixed_fee(Money::from_decimal(dec!(5000))).unwrap().amount(), dec!(10000));
        assert_eq!(caf.applied_rate(), None);
    }

    #[test]
    fn test_forward_reference_rejected() {
        let rules = vec![
            ChargeRule::new("GCT", rate(dec!(0.15)), BaseSelector::cif_plus(["ID-01"])).with_precedence(1),
            ChargeRule::new("ID-01", rate(dec!(0.20)), BaseSelector::cif()).with_precedence(2),
        ];
        let err = ChargeSchedule::new(1, rules).unwrap_err();
        assert_eq!(
            err,
            CoreError::base_reference("GCT", "ID-01", "referenced charge runs later in the cascade")
        );
    }

    #[test]
    fn test_self_and_undefined_references_rejected() {
        let self_ref = vec![ChargeRule::new("GCT", rate(dec!(0.15)), BaseSelector::cif_plus(["GCT"]))];
        assert!(matches!(
            ChargeSchedule::new(1, self_ref).unwrap_err(),
            CoreError::CircularOrForwardBaseReference { .. }
        ));

        let undefined = vec![ChargeRule::new("GCT", rate(dec!(0.15)), BaseSelector::cif_plus(["EXC"]))];
        assert!(matches!(
            ChargeSchedule::new(1, undefined).unwrap_err(),
            CoreError::CircularOrForwardBaseReference { .. }
        ));

        let reserved = vec![ChargeRule::new("cif", rate(dec!(0.15)), BaseSelector::cif())];
        assert!(ChargeSchedule::new(1, reserved).is_err());
    }

    #[test]
    fn test_names_differing_only_by_case_rejected() {
        let rules = vec![
            ChargeRule::new("ID-01", rate(dec!(0.20)), BaseSelector::cif()),
            ChargeRule::new("id-01", rate(dec!(0.30)), BaseSelector::cif())
                .when(AppliesWhen::code("8703*".parse().unwrap())),
        ];
        assert!(matches!(
            ChargeSchedule::new(1, rules).unwrap_err(),
            CoreError::InvalidConfiguration(msg) if msg.contains("differ only by case")
        ));
    }

    #[test]
    fn test_names_trimmed_and_references_adopt_spelling() {
        let rules = vec![
            ChargeRule::new(" ID-01 ", rate(dec!(0.20)), BaseSelector::cif()),
            ChargeRule::new("GCT", rate(dec!(0.15)), BaseSelector::cif_plus(["id-01"])).with_precedence(1),
        ];
        let schedule = ChargeSchedule::new(1, rules).unwrap();
        assert_eq!(schedule.charge_names(), ["ID-01", "GCT"]);

        let resolved = schedule
            .resolve(&code("8471.30.00"), TransactionType::CommercialCargo, PackageType::General)
            .unwrap();
        assert_eq!(names(&resolved), vec!["ID-01", "GCT"]);
        assert_eq!(resolved[1].base.to_string(), "CIF + ID-01");
    }

    #[test]
    fn test_colliding_variants_rejected() {
        let rules = vec![
            ChargeRule::new("ID-01", rate(dec!(0.20)), BaseSelector::cif())
                .when(AppliesWhen::code("8703*".parse().unwrap())),
            ChargeRule::new("ID-01", rate(dec!(0.30)), BaseSelector::cif())
                .when(AppliesWhen::code("8703*".parse().unwrap())),
        ];
        assert!(matches!(
            ChargeSchedule::new(1, rules).unwrap_err(),
            CoreError::CircularOrForwardBaseReference { .. }
        ));
    }

    #[test]
    fn test_variants_must_share_base() {
        let rules = vec![
            ChargeRule::new("ID-01", rate(dec!(0.20)), BaseSelector::cif()),
            ChargeRule::new("SCF90", rate(dec!(0.003)), BaseSelector::cif()).with_precedence(1),
            ChargeRule::new("ID-01", rate(dec!(0.30)), BaseSelector::cif_plus(["SCF90"]))
                .when(AppliesWhen::code("8703*".parse().unwrap())),
        ];
        assert!(matches!(
            ChargeSchedule::new(1, rules).unwrap_err(),
            CoreError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_resolve_orders_by_precedence_not_declaration() {
        let schedule = ChargeSchedule::new(
            1,
            vec![
                ChargeRule::new("GCT", rate(dec!(0.15)), BaseSelector::cif_plus(["ID-01"])).with_precedence(20),
                ChargeRule::new("ID-01", rate(dec!(0.20)), BaseSelector::cif()).with_precedence(10),
                ChargeRule::new("SCF90", rate(dec!(0.003)), BaseSelector::cif()).with_precedence(10),
            ],
        )
        .unwrap();

        let resolved = schedule
            .resolve(&code("8703.23"), TransactionType::CommercialCargo, PackageType::General)
            .unwrap();
        assert_eq!(names(&resolved), vec!["ID-01", "SCF90", "GCT"]);
    }

    #[test]
    fn test_resolve_picks_most_specific_variant() {
        let schedule = ChargeSchedule::new(
            1,
            vec![
                ChargeRule::new("ID-01", rate(dec!(0.20)), BaseSelector::cif()),
                ChargeRule::new("ID-01", rate(dec!(0.30)), BaseSelector::cif())
                    .when(AppliesWhen::code("8703*".parse().unwrap())),
                ChargeRule::new("ID-01", rate(dec!(0.40)), BaseSelector::cif())
                    .when(AppliesWhen::code("8703.23.10".parse().unwrap())),
            ],
        )
        .unwrap();

        let pick = |c: &str| {
            schedule
                .resolve(&code(c), TransactionType::PersonalUse, PackageType::General)
                .unwrap()[0]
                .amount
                .clone()
        };
        assert_eq!(pick("8703.23.10"), rate(dec!(0.40)));
        assert_eq!(pick("8703.24"), rate(dec!(0.30)));
        assert_eq!(pick("0101"), rate(dec!(0.20)));
    }

    #[test]
    fn test_resolve_no_match_is_empty() {
        let schedule = ChargeSchedule::new(
            1,
            vec![ChargeRule::new("EXC", rate(dec!(0.10)), BaseSelector::cif())
                .when(AppliesWhen::code("2203*".parse().unwrap()))],
        )
        .unwrap();
        let resolved = schedule
            .resolve(&code("8703"), TransactionType::PersonalUse, PackageType::General)
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_resolve_drops_inapplicable_base_references() {
        let schedule = ChargeSchedule::new(
            1,
            vec![
                ChargeRule::new("ID-01", rate(dec!(0.20)), BaseSelector::cif()).with_precedence(1),
                ChargeRule::new("ASD05", rate(dec!(0.05)), BaseSelector::cif_plus(["ID-01"]))
                    .with_precedence(2)
                    .when(AppliesWhen::code("2203*".parse().unwrap())),
                ChargeRule::new("GCT", rate(dec!(0.15)), BaseSelector::cif_plus(["ID-01", "ASD05"]))
                    .with_precedence(3),
            ],
        )
        .unwrap();

        let resolved = schedule
            .resolve(&code("8703"), TransactionType::CommercialCargo, PackageType::General)
            .unwrap();
        assert_eq!(names(&resolved), vec!["ID-01", "GCT"]);
        assert_eq!(resolved[1].base.to_string(), "CIF + ID-01");
    }

    #[test]
    fn test_resolve_type_filters() {
        let personal = AppliesWhen {
            code: CodePattern::Any,
            transaction_types: vec![TransactionType::PersonalUse],
            package_types: vec![],
        };
        let vehicles = AppliesWhen {
            code: CodePattern::Any,
            transaction_types: vec![TransactionType::PersonalUse, TransactionType::CommercialCargo],
            package_types: vec![PackageType::MotorVehicle],
        };
        let schedule = ChargeSchedule::new(
            1,
            vec![
                ChargeRule::new("CAF", ChargeAmount::Fixed(Money::from_decimal(dec!(2500))), BaseSelector::cif())
                    .when(personal),
                ChargeRule::new("CAF", ChargeAmount::Fixed(Money::from_decimal(dec!(57500))), BaseSelector::cif())
                    .when(vehicles),
            ],
        )
        .unwrap();

        let fee = |tx, pkg| {
            schedule
                .resolve(&code("8703"), tx, pkg)
                .unwrap()
                .first()
                .map(|r| r.amount.clone())
        };
        assert_eq!(
            fee(TransactionType::PersonalUse, PackageType::MotorVehicle),
            Some(ChargeAmount::Fixed(Money::from_decimal(dec!(57500))))
        );
        assert_eq!(
            fee(TransactionType::PersonalUse, PackageType::General),
            Some(ChargeAmount::Fixed(Money::from_decimal(dec!(2500))))
        );
        assert_eq!(fee(TransactionType::CommercialCargo, PackageType::General), None);
    }

    #[test]
    fn test_charge_amount_serde_shape() {
        let json = serde_json::to_value(rate(dec!(0.15))).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "rate", "value": "0.15"}));
    }
}
