//! Utilidades para procesamiento de respuestas de IA
//!
//! Reduce la respuesta del modelo al cuerpo del diagrama, descartando el
//! texto explicativo antes y después.

use crate::rules::DiagramFamily;
use std::ops::Range;

/// Rangos en bytes del cuerpo de cada bloque delimitado que empieza con
/// `tag` (p. ej. "```mermaid"). Con tag "```" devuelve cualquier bloque.
fn rangos_bloques(texto: &str, tag: &str) -> Vec<Range<usize>> {
    let mut encontrados = Vec::new();
    let mut desde = 0;

    while let Some(start) = texto[desde..].find(tag) {
        let apertura = desde + start + tag.len();
        // El resto de la línea de apertura es la etiqueta de lenguaje
        let inicio = match texto[apertura..].find('\n') {
            Some(nl) => apertura + nl + 1,
            None => break,
        };
        match texto[inicio..].find("```") {
            Some(end) => {
                encontrados.push(inicio..inicio + end);
                desde = inicio + end + 3;
            }
            None => break,
        }
    }

    encontrados
}

fn bloques(texto: &str, tag: &str) -> Vec<String> {
    rangos_bloques(texto, tag)
        .into_iter()
        .map(|r| texto[r].trim().to_string())
        .collect()
}

/// Cuerpo del bloque que `extraer_diagrama` elegiría, con el mismo orden de
/// preferencia. `None` si el diagrama no está dentro de un bloque.
fn rango_del_diagrama(texto: &str, keyword: &str) -> Option<Range<usize>> {
    let mermaid = rangos_bloques(texto, "```mermaid");
    let elegido = mermaid
        .iter()
        .find(|r| texto[(*r).clone()].contains(keyword))
        .or(mermaid.first());
    if let Some(r) = elegido {
        if !texto[r.clone()].trim().is_empty() {
            return Some(r.clone());
        }
    }

    rangos_bloques(texto, "```")
        .into_iter()
        .find(|r| texto[r.clone()].contains(keyword))
}

/// Desde la línea con la palabra clave. Dentro de un bloque, o si no hay
/// prosa antes, se toma todo; si no, solo las líneas indentadas o vacías
/// que siguen.
fn desde_palabra_clave(texto: &str, keyword: &str, en_bloque: bool) -> Option<String> {
    let lineas: Vec<&str> = texto.lines().collect();
    let inicio = lineas.iter().position(|l| l.trim_start().starts_with(keyword))?;
    let sin_prosa_previa = en_bloque || lineas[..inicio].iter().all(|l| l.trim().is_empty());

    let mut cuerpo = vec![lineas[inicio].trim()];
    for linea in &lineas[inicio + 1..] {
        if linea.trim_start().starts_with("```") {
            break;
        }
        let indentada = linea.starts_with(' ') || linea.starts_with('\t') || linea.trim().is_empty();
        if !sin_prosa_previa && !indentada {
            break;
        }
        cuerpo.push(linea.trim_end());
    }

    Some(cuerpo.join("\n").trim_end().to_string())
}

/// Extrae el diagrama de la familia pedida de una respuesta de IA.
///
/// Orden de búsqueda: bloque ```mermaid, cualquier bloque que contenga la
/// palabra clave y por último la línea de la palabra clave en texto plano.
/// `None` si no hay ningún marcador reconocible.
pub fn extraer_diagrama(texto: &str, family: DiagramFamily) -> Option<String> {
    let keyword = family.keyword();

    let mermaid = bloques(texto, "```mermaid");
    if let Some(bloque) = mermaid.iter().find(|b| b.contains(keyword)).or(mermaid.first()) {
        if !bloque.is_empty() {
            return Some(bloque.clone());
        }
    }

    for bloque in bloques(texto, "```") {
        if bloque.contains(keyword) {
            return desde_palabra_clave(&bloque, keyword, true);
        }
    }

    desde_palabra_clave(texto, keyword, false)
}

/// Sustituye el diagrama dentro de su bloque y conserva el resto del
/// documento. `None` si el texto no tiene el diagrama en un bloque.
pub fn reemplazar_diagrama(texto: &str, family: DiagramFamily, nuevo: &str) -> Option<String> {
    let rango = rango_del_diagrama(texto, family.keyword())?;
    let mut resultado = String::with_capacity(texto.len() + nuevo.len());
    resultado.push_str(&texto[..rango.start]);
    resultado.push_str(nuevo.trim_end());
    resultado.push('\n');
    resultado.push_str(&texto[rango.end..]);
    Some(resultado)
}
