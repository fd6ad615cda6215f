//! Reglas para diagramas de clases
//!
//! Todas inspeccionan los extremos de una relación ya parseada. Si la línea
//! tiene un operador pero no es una relación válida, la regla lo reporta en
//! lugar de dejarla pasar.

use crate::rules::relationship::Relationship;
use crate::rules::{invalid_relationship, LineRule, RuleOutcome, RuleViolation};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static COLLECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(List|Set|ArrayList|LinkedList|Collection|HashSet|TreeSet|Queue|Deque)\s*(?:<(.+)>|~(.+)~)")
        .expect("patrón de colecciones inválido")
});

static MAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(Map|HashMap|TreeMap|LinkedHashMap|ConcurrentHashMap)\b")
        .expect("patrón de mapas inválido")
});

static PRIMITIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(int|float|double|short|long|byte|char|boolean|String|Integer|Float|Double|Short|Long|Byte|Character|Boolean|StringBuffer|StringBuilder|File|Object)\b",
    )
    .expect("patrón de primitivos inválido")
});

static ARRAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z0-9_]+)\s*\[\s*\]").expect("patrón de arrays inválido")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "Left"),
            Side::Right => write!(f, "Right"),
        }
    }
}

/// Reemplaza la entidad en la línea original: la primera aparición para el
/// lado izquierdo, la última para el derecho.
fn rewrite_side(line: &str, entity: &str, replacement: &str, side: Side) -> String {
    let found = match side {
        Side::Left => line.find(entity),
        Side::Right => line.rfind(entity),
    };
    match found {
        Some(idx) => format!("{}{}{}", &line[..idx], replacement, &line[idx + entity.len()..]),
        None => line.to_string(),
    }
}

/// Aplica `check_side` al lado izquierdo y, si pasa, al derecho.
fn check_endpoints<F>(line: &str, line_number: usize, check_side: F) -> RuleOutcome
where
    F: Fn(Side, &str) -> Option<RuleViolation>,
{
    if !Relationship::has_relationship(line) {
        return RuleOutcome::Pass;
    }
    let Some(relationship) = Relationship::parse(line) else {
        return invalid_relationship(line, line_number);
    };
    check_side(Side::Left, &relationship.left)
        .or_else(|| check_side(Side::Right, &relationship.right))
        .map(RuleOutcome::Violation)
        .unwrap_or(RuleOutcome::Pass)
}

/// Prohíbe colecciones (`List<Foo>`) como entidades; sugiere cardinalidad "many"
#[derive(Debug, Default)]
pub struct NoCollectionRule;

impl NoCollectionRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for NoCollectionRule {
    fn id(&self) -> &'static str {
        "no_collection"
    }

    fn description(&self) -> &str {
        "Collections are not valid actors; use a \"many\" cardinality on the element type"
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        check_endpoints(line, line_number, |side, entity| {
            let caps = COLLECTION.captures(entity)?;
            let collection = caps.get(1)?.as_str();
            let inner = caps.get(2).or_else(|| caps.get(3))?.as_str().trim();
            let replacement = match side {
                Side::Left => format!("{} \"many\"", inner),
                Side::Right => format!("\"many\" {}", inner),
            };
            Some(RuleViolation::at_line(
                line_number,
                line,
                format!("No{}{}", side, collection),
                format!(
                    "Not a valid actor {} try `{}` instead",
                    entity,
                    rewrite_side(line, entity, &replacement, side)
                ),
            ))
        })
    }
}

/// Prohíbe mapas como entidades
#[derive(Debug, Default)]
pub struct NoMapRule;

impl NoMapRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for NoMapRule {
    fn id(&self) -> &'static str {
        "no_map"
    }

    fn description(&self) -> &str {
        "No Maps allowed, remove relationship from diagram or use \"*\" and describe key association in description of relationship"
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        check_endpoints(line, line_number, |side, entity| {
            MAP.is_match(entity).then(|| {
                RuleViolation::at_line(line_number, line, format!("NoMap{}", side), self.description())
            })
        })
    }
}

/// Prohíbe tipos primitivos o básicos (`int`, `String`, `Object`...) como entidades
#[derive(Debug, Default)]
pub struct NoPrimitiveOrBasicTypesRule;

impl NoPrimitiveOrBasicTypesRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for NoPrimitiveOrBasicTypesRule {
    fn id(&self) -> &'static str {
        "no_primitive_or_basic_types"
    }

    fn description(&self) -> &str {
        "Not basic or primitive types"
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        check_endpoints(line, line_number, |side, entity| {
            let found = PRIMITIVE.captures(entity)?.get(1)?.as_str();
            Some(RuleViolation::at_line(
                line_number,
                line,
                format!("NoPrimitives{} {}", side, found),
                self.description(),
            ))
        })
    }
}

/// Prohíbe arrays (`Foo[]`) como entidades; sugiere cardinalidad "*"
#[derive(Debug, Default)]
pub struct NoArrayRule;

impl NoArrayRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for NoArrayRule {
    fn id(&self) -> &'static str {
        "no_array"
    }

    fn description(&self) -> &str {
        "Arrays are not valid actors; use a \"*\" cardinality on the element type"
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        check_endpoints(line, line_number, |side, entity| {
            let caps = ARRAY.captures(entity)?;
            let declaration = caps.get(0)?.as_str();
            let class_name = caps.get(1)?.as_str();
            let replacement = match side {
                Side::Left => format!("{} \"*\"", class_name),
                Side::Right => format!("\"*\" {}", class_name),
            };
            Some(RuleViolation::at_line(
                line_number,
                line,
                format!("NoArrayRule{}", side),
                format!(
                    "Arrays like {} are not allowed in the relationship {} try `{}` instead",
                    declaration,
                    entity,
                    rewrite_side(line, entity, &replacement, side)
                ),
            ))
        })
    }
}

/// Reglas por defecto para diagramas de clases, en orden de registro
pub fn class_rules() -> Vec<Box<dyn LineRule>> {
    vec![
        Box::new(NoCollectionRule::new()),
        Box::new(NoPrimitiveOrBasicTypesRule::new()),
        Box::new(NoArrayRule::new()),
        Box::new(NoMapRule::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(outcome: RuleOutcome) -> RuleViolation {
        outcome.violation().expect("se esperaba una violación")
    }

    #[test]
    fn test_no_array_left() {
        let v = violation(NoArrayRule::new().check("Employee[]-- Employee", 1));
        assert_eq!(v.rule_name, "NoArrayRuleLeft");
        assert_eq!(
            v.description,
            "Arrays like Employee[] are not allowed in the relationship Employee[] try `Employee \"*\"-- Employee` instead"
        );
    }

    #[test]
    fn test_no_array_right() {
        let v = violation(NoArrayRule::new().check("Employee -- Employee[]", 1));
        assert_eq!(v.rule_name, "NoArrayRuleRight");
        assert!(v.description.contains("try `Employee -- \"*\" Employee` instead"));
    }

    #[test]
    fn test_no_collection() {
        let rule = NoCollectionRule::new();

        let line = "Class1 <-- List<Class2>: fieldName";
        let v = violation(rule.check(line, 1));
        assert_eq!(v.rule_name, "NoRightList");
        assert_eq!(v.line_number, 1);
        assert_eq!(v.violated_line, line);
        assert_eq!(
            v.description,
            "Not a valid actor List<Class2> try `Class1 <-- \"many\" Class2: fieldName` instead"
        );

        let v = violation(rule.check("List<Class2> *-- Class1: fieldName", 1));
        assert_eq!(v.rule_name, "NoLeftList");
        assert_eq!(
            v.description,
            "Not a valid actor List<Class2> try `Class2 \"many\" *-- Class1: fieldName` instead"
        );

        let v = violation(rule.check("Class1 *-- Set<Dogs>: fieldName", 1));
        assert_eq!(v.rule_name, "NoRightSet");
        assert!(v.description.contains("`Class1 *-- \"many\" Dogs: fieldName`"));

        assert!(rule.check("Class1 *-- Class2: fieldName", 1).is_pass());
    }

    #[test]
    fn test_no_collection_nested_generic() {
        let v = violation(NoCollectionRule::new().check("Order *-- List<Map<String, Item>>", 4));
        assert_eq!(v.rule_name, "NoRightList");
        assert!(v.description.contains("\"many\" Map<String, Item>"));
    }

    #[test]
    fn test_no_map() {
        let rule = NoMapRule::new();
        assert!(rule.check("Class1 --> Class2: Association", 1).is_pass());
        assert_eq!(rule.check("Map<String, Integer> --> Class2: Association", 1).rule_name(), "NoMapLeft");
        assert_eq!(rule.check("Class1 --> Map<String, Integer>: Association", 1).rule_name(), "NoMapRight");
        assert_eq!(
            rule.check("Map<String, Integer> --> Map<String, String>: Association", 1).rule_name(),
            "NoMapLeft"
        );
        assert!(rule.check("ObjectMapper --> Class2", 1).is_pass());
    }

    #[test]
    fn test_no_primitives() {
        let rule = NoPrimitiveOrBasicTypesRule::new();
        for line in ["Class1 -- Class2", "Class1  --> Class2", "Class1 <|--   Class2"] {
            assert!(rule.check(line, 1).is_pass(), "Debería pasar: {}", line);
        }
        assert_eq!(rule.check("int -- Class1", 1).rule_name(), "NoPrimitivesLeft int");
        assert_eq!(rule.check("Class2 -- String", 2).rule_name(), "NoPrimitivesRight String");
        assert_eq!(rule.check("Class3  --> double", 3).rule_name(), "NoPrimitivesRight double");
        assert_eq!(rule.check("Object -- Class1", 1).rule_name(), "NoPrimitivesLeft Object");
        assert_eq!(rule.check("ObjectMapper -- Foo", 1).rule_name(), "pass");
    }

    #[test]
    fn test_malformed_relationship_never_passes() {
        for rule in class_rules() {
            let outcome = rule.check("Class1 \"one *-- Class2", 7);
            let v = violation(outcome);
            assert_eq!(v.rule_name, "ValidRelationshipRule");
            assert_eq!(v.description, "Not a valid relationship");
            assert_eq!(v.line_number, 7);
        }
    }

    #[test]
    fn test_non_relationship_lines_pass() {
        for rule in class_rules() {
            for line in ["classDiagram", "class Order {", "  +List~Item~ items", "}", ""] {
                assert!(rule.check(line, 1).is_pass(), "{} no debería fallar en: {}", rule.id(), line);
            }
        }
    }
}
