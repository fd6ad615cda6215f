//! Parser de relaciones de diagramas de clases
//!
//! Descompone una línea como `Class1 "one" *-- "many" Class2 : fieldName` en
//! entidades, cardinalidades, operador y descripción. Las reglas de clases lo
//! usan para inspeccionar solo los extremos de la relación.
//!
//! Política para genéricos: los parámetros se conservan tal cual en el nombre
//! de la entidad (`Map<String, List<Integer>>` es una sola entidad). Se admiten
//! espacios solo dentro de `<...>` o `~...~` balanceados; cualquier otro espacio,
//! o un genérico sin cerrar, hace que la línea no sea una relación válida.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Operadores ordenados del más específico al menos específico: con
/// alternancia leftmost-first, `--|>` gana a `--` en la misma posición.
static OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"<\|--|--\|>|<\|\.\.|\.\.\|>|\*--|--\*|\bo--|--o\b|<--|-->|<\.\.|\.\.>|--|\.\.",
    )
    .expect("patrón de operadores inválido")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// `<|--` / `--|>`
    Inheritance,
    /// `<|..` / `..|>`
    Realization,
    /// `*--` / `--*`
    Composition,
    /// `o--` / `--o`
    Aggregation,
    /// `-->` / `<--`
    DirectedAssociation,
    /// `--`
    Association,
    /// `..>` / `<..`
    Dependency,
    /// `..`
    DashedLink,
}

impl RelationshipKind {
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "<|--" | "--|>" => Some(Self::Inheritance),
            "<|.." | "..|>" => Some(Self::Realization),
            "*--" | "--*" => Some(Self::Composition),
            "o--" | "--o" => Some(Self::Aggregation),
            "-->" | "<--" => Some(Self::DirectedAssociation),
            "--" => Some(Self::Association),
            "..>" | "<.." => Some(Self::Dependency),
            ".." => Some(Self::DashedLink),
            _ => None,
        }
    }
}

/// Arista estructural de un diagrama de clases ya parseada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub left: String,
    pub left_cardinality: String,
    pub kind: RelationshipKind,
    pub operator: String,
    pub right_cardinality: String,
    pub right: String,
    pub description: String,
}

/// Las líneas `%%` son comentarios Mermaid y nunca contienen relaciones
fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with("%%")
}

/// Devuelve una copia de la línea con el contenido de cada par de comillas
/// cerrado reemplazado por `_`, conservando los offsets en bytes. Una comilla
/// sin pareja no se enmascara.
fn mask_quoted(line: &str) -> String {
    let quotes: Vec<usize> = line
        .bytes()
        .enumerate()
        .filter(|(_, b)| *b == b'"')
        .map(|(i, _)| i)
        .collect();

    let mut masked = line.as_bytes().to_vec();
    for pair in quotes.chunks_exact(2) {
        for b in masked.iter_mut().take(pair[1]).skip(pair[0] + 1) {
            *b = b'_';
        }
    }
    // Solo se sustituyen caracteres completos entre comillas ASCII
    String::from_utf8(masked).unwrap_or_else(|_| line.to_string())
}

/// Una entidad válida no está vacía, tiene genéricos balanceados y no
/// contiene espacios fuera de ellos.
fn is_valid_entity(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let mut angle_depth: i32 = 0;
    let mut in_tilde = false;
    for c in name.chars() {
        match c {
            '<' => angle_depth += 1,
            '>' => {
                angle_depth -= 1;
                if angle_depth < 0 {
                    return false;
                }
            }
            '~' => in_tilde = !in_tilde,
            '"' => return false,
            c if c.is_whitespace() && angle_depth == 0 && !in_tilde => return false,
            _ => {}
        }
    }
    angle_depth == 0 && !in_tilde
}

/// `Entity "card"` → (entity, card)
fn split_left(left: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = left.split('"').collect();
    let (entity, card) = match parts.as_slice() {
        [entity] => (entity.trim(), ""),
        [entity, card, after] if after.trim().is_empty() => (entity.trim(), *card),
        _ => return None,
    };
    if !is_valid_entity(entity) {
        return None;
    }
    Some((entity.to_string(), card.to_string()))
}

/// `"card" Entity` → (card, entity)
fn split_right(right: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = right.split('"').collect();
    let (card, entity) = match parts.as_slice() {
        [entity] => ("", entity.trim()),
        [before, card, entity] if before.trim().is_empty() => (*card, entity.trim()),
        _ => return None,
    };
    if !is_valid_entity(entity) {
        return None;
    }
    Some((card.to_string(), entity.to_string()))
}

impl Relationship {
    /// Indica si la línea contiene algún operador de relación fuera de comillas
    pub fn has_relationship(line: &str) -> bool {
        !is_comment(line) && OPERATOR.is_match(&mask_quoted(line))
    }

    /// Parsea la línea. Devuelve `None` si no hay operador o si la relación
    /// está mal formada (lado derecho vacío, entidad vacía, comillas sin cerrar).
    pub fn parse(line: &str) -> Option<Relationship> {
        if is_comment(line) {
            return None;
        }
        let masked = mask_quoted(line);
        let found = OPERATOR.find(&masked)?;

        let left = line[..found.start()].trim();
        let operator = &line[found.start()..found.end()];
        let rest = line[found.end()..].trim();
        if rest.is_empty() {
            return None;
        }

        let (right, description) = match mask_quoted(rest).find(':') {
            Some(idx) => (rest[..idx].trim(), rest[idx + 1..].trim()),
            None => (rest, ""),
        };
        if right.is_empty() {
            return None;
        }

        let (left_entity, left_cardinality) = split_left(left)?;
        let (right_cardinality, right_entity) = split_right(right)?;
        let kind = RelationshipKind::from_operator(operator)?;

        Some(Relationship {
            left: left_entity,
            left_cardinality,
            kind,
            operator: operator.to_string(),
            right_cardinality,
            right: right_entity,
            description: description.to_string(),
        })
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.left)?;
        if !self.left_cardinality.is_empty() {
            write!(f, " \"{}\"", self.left_cardinality)?;
        }
        write!(f, " {} ", self.operator)?;
        if !self.right_cardinality.is_empty() {
            write!(f, "\"{}\" ", self.right_cardinality)?;
        }
        write!(f, "{}", self.right)?;
        if !self.description.is_empty() {
            write!(f, " : {}", self.description)?;
        }
        Ok(())
    }
}
