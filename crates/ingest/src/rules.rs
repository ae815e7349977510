use regex::Regex;
use serde::{Deserialize, Serialize};

use saldo_core::{AccountId, CategoryId};

use crate::re;
use crate::text::match_key;

re!(re_fee, r"TARIFA|JUROS|MULTA|IOF|ANUIDADE|ENCARGO|CESTA DE SERVICOS|TAXA DE");
re!(re_corporate, r"\b(LTDA|EIRELI|COMERCIO|SERVICOS|PAGAMENTOS|TECNOLOGIA)\b");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleMatch {
    Contains,
    Regex,
}

impl std::str::FromStr for RuleMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(RuleMatch::Contains),
            "regex" => Ok(RuleMatch::Regex),
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

/// A user-defined classification rule. Owned and edited elsewhere; this
/// engine only evaluates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRule {
    pub id: i64,
    pub name: String,
    /// Lower evaluates first.
    pub priority: i32,
    pub enabled: bool,
    pub match_type: RuleMatch,
    pub pattern: String,
    pub account_id: Option<AccountId>,
    pub min_amount_cents: Option<i64>,
    pub max_amount_cents: Option<i64>,
    pub category_id: CategoryId,
}

/// A built-in heuristic rule. Fires only when the user actually has a
/// category matching one of its aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinRule {
    pub name: String,
    /// Regex over the combined match-key text (uppercase, accent-free).
    pub pattern: String,
    pub aliases: Vec<String>,
    /// When set, the rule additionally requires the counterparty to look
    /// like a person's name, the PIX person-to-person shape.
    #[serde(default)]
    pub person_counterparty: bool,
}

#[derive(Debug, Deserialize)]
struct BuiltinRuleFile {
    rules: Vec<BuiltinRule>,
}

/// Parse built-in rules from a TOML `[[rules]]` document, for tests and
/// deployments that tune the defaults.
pub fn builtin_rules_from_toml(content: &str) -> Result<Vec<BuiltinRule>, String> {
    let file: BuiltinRuleFile =
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML: {e}"))?;
    Ok(file.rules)
}

pub fn default_builtin_rules() -> Vec<BuiltinRule> {
    let rule = |name: &str, pattern: &str, aliases: &[&str], person: bool| BuiltinRule {
        name: name.to_string(),
        pattern: pattern.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        person_counterparty: person,
    };
    vec![
        rule(
            "supermarket",
            r"SUPERMERCADO|MERCADO|CARREFOUR|ATACADAO|PAO DE ACUCAR|HORTIFRUTI|SACOLAO",
            &["mercado", "supermercado", "groceries", "alimentacao"],
            false,
        ),
        rule(
            "food-delivery",
            r"IFOOD|RESTAURANTE|LANCHONETE|PADARIA|PIZZARIA|HAMBURGUERIA|CAFETERIA",
            &["restaurante", "delivery", "refeicao", "alimentacao", "food"],
            false,
        ),
        rule(
            "fuel-transport",
            r"POSTO|COMBUSTIVEL|UBER|99 ?APP|ESTACIONAMENTO|PEDAGIO|METRO|ONIBUS",
            &["transporte", "combustivel", "transport", "carro"],
            false,
        ),
        rule(
            "p2p-transfer",
            r"\b(PIX|TED|DOC|TRANSF(ERENCIA)?)\b",
            &["transferencia", "transfer", "pix", "pessoal"],
            true,
        ),
    ]
}

/// A category the user owns, for alias resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

/// The row facts the engine classifies on. `text` is the combined
/// match-key of description + counterparty + kind; `amount_cents` is the
/// absolute amount.
#[derive(Debug, Clone)]
pub struct RowContext<'a> {
    pub text: &'a str,
    pub counterparty: Option<&'a str>,
    pub amount_cents: i64,
    pub account_id: AccountId,
}

/// Which stage produced a categorization, for traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CategorySource {
    UserRule { id: i64, name: String },
    BuiltinRule { name: String },
    Fallback,
    NoMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Categorization {
    pub category_id: Option<CategoryId>,
    pub source: CategorySource,
}

struct CompiledUserRule {
    rule: UserRule,
    pattern_key: String,
    regex: Option<Regex>,
}

struct CompiledBuiltin {
    rule: BuiltinRule,
    regex: Option<Regex>,
    category_id: Option<CategoryId>,
}

/// Ordered dispatch: user rules by ascending priority, then built-in
/// heuristics, then the fee fallback. First hit wins and carries its
/// provenance.
pub struct Categorizer {
    user_rules: Vec<CompiledUserRule>,
    builtin: Vec<CompiledBuiltin>,
    fee_category: Option<CategoryId>,
}

impl Categorizer {
    pub fn new(
        user_rules: Vec<UserRule>,
        builtin: Vec<BuiltinRule>,
        categories: &[CategoryRef],
    ) -> Self {
        let mut compiled: Vec<CompiledUserRule> = user_rules
            .into_iter()
            .filter(|r| r.enabled)
            .map(|rule| {
                // Invalid user regexes compile to None and never match.
                let regex = match rule.match_type {
                    RuleMatch::Regex => Regex::new(&rule.pattern).ok(),
                    RuleMatch::Contains => None,
                };
                let pattern_key = match_key(&rule.pattern);
                CompiledUserRule { rule, pattern_key, regex }
            })
            .collect();
        compiled.sort_by_key(|cr| cr.rule.priority);

        let builtin = builtin
            .into_iter()
            .map(|rule| {
                let regex = Regex::new(&rule.pattern).ok();
                let category_id = resolve_alias(categories, &rule.aliases);
                CompiledBuiltin { rule, regex, category_id }
            })
            .collect();

        let fee_category = resolve_alias(
            categories,
            &[
                "tarifa".to_string(),
                "tarifas".to_string(),
                "taxas".to_string(),
                "encargos".to_string(),
                "fees".to_string(),
            ],
        );

        Categorizer { user_rules: compiled, builtin, fee_category }
    }

    pub fn with_defaults(user_rules: Vec<UserRule>, categories: &[CategoryRef]) -> Self {
        Self::new(user_rules, default_builtin_rules(), categories)
    }

    pub fn categorize(&self, row: &RowContext<'_>) -> Categorization {
        for cr in &self.user_rules {
            if self.user_rule_matches(cr, row) {
                return Categorization {
                    category_id: Some(cr.rule.category_id),
                    source: CategorySource::UserRule {
                        id: cr.rule.id,
                        name: cr.rule.name.clone(),
                    },
                };
            }
        }

        for cb in &self.builtin {
            let Some(category_id) = cb.category_id else {
                continue;
            };
            let Some(regex) = &cb.regex else {
                continue;
            };
            if !regex.is_match(row.text) {
                continue;
            }
            if cb.rule.person_counterparty
                && !row.counterparty.is_some_and(looks_like_person_name)
            {
                continue;
            }
            return Categorization {
                category_id: Some(category_id),
                source: CategorySource::BuiltinRule { name: cb.rule.name.clone() },
            };
        }

        if re_fee().is_match(row.text) {
            if let Some(category_id) = self.fee_category {
                return Categorization {
                    category_id: Some(category_id),
                    source: CategorySource::Fallback,
                };
            }
        }

        Categorization { category_id: None, source: CategorySource::NoMatch }
    }

    fn user_rule_matches(&self, cr: &CompiledUserRule, row: &RowContext<'_>) -> bool {
        let rule = &cr.rule;

        if let Some(account_id) = rule.account_id {
            if account_id != row.account_id {
                return false;
            }
        }
        if let Some(min) = rule.min_amount_cents {
            if row.amount_cents < min {
                return false;
            }
        }
        if let Some(max) = rule.max_amount_cents {
            if row.amount_cents > max {
                return false;
            }
        }

        match rule.match_type {
            RuleMatch::Contains => !cr.pattern_key.is_empty() && row.text.contains(&cr.pattern_key),
            RuleMatch::Regex => cr.regex.as_ref().is_some_and(|re| re.is_match(row.text)),
        }
    }
}

/// Case-insensitive substring match in either direction between a user
/// category name and a rule alias.
fn resolve_alias(categories: &[CategoryRef], aliases: &[String]) -> Option<CategoryId> {
    for category in categories {
        let cat_key = match_key(&category.name);
        if cat_key.is_empty() {
            continue;
        }
        for alias in aliases {
            let alias_key = match_key(alias);
            if cat_key.contains(&alias_key) || alias_key.contains(&cat_key) {
                return Some(category.id);
            }
        }
    }
    None
}

/// A person-shaped counterparty: at least two alphabetic words, no
/// digits, no corporate markers.
fn looks_like_person_name(counterparty: &str) -> bool {
    let key = match_key(counterparty);
    if key.chars().any(|c| c.is_ascii_digit()) || re_corporate().is_match(&key) {
        return false;
    }
    key.split_whitespace()
        .filter(|t| t.len() >= 2 && t.chars().all(char::is_alphabetic))
        .count()
        >= 2
}
