// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TEXT UTILITIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Utilitários para processamento de texto:
// - Tokenização com offsets
// - Stopwords (português + inglês)
// - Medidas lexicais (Jaccard, cosseno de conjuntos, cobertura)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’\-][\p{L}\p{N}]+)*").expect("Valid word regex")
});

/// Token com offsets relativos ao texto tokenizado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Texto original do token
    pub text: &'a str,
    /// Offset inicial (bytes)
    pub start: usize,
    /// Offset final (bytes)
    pub end: usize,
}

impl Token<'_> {
    /// Forma normalizada (minúsculas)
    pub fn normalized(&self) -> String {
        self.text.to_lowercase()
    }
}

/// Tokeniza em palavras, preservando offsets
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    WORD_RE
        .find_iter(text)
        .map(|m| Token {
            text: m.as_str(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Palavras normalizadas (minúsculas)
pub fn normalized_words(text: &str) -> Vec<String> {
    tokenize(text).iter().map(Token::normalized).collect()
}

/// Palavras de conteúdo (sem stopwords), normalizadas
pub fn content_words(text: &str) -> Vec<String> {
    normalized_words(text)
        .into_iter()
        .filter(|w| !is_stopword(w))
        .collect()
}

/// Conjunto de palavras de conteúdo
pub fn content_set(text: &str) -> HashSet<String> {
    content_words(text).into_iter().collect()
}

/// Conta palavras em um texto
pub fn word_count(text: &str) -> usize {
    tokenize(text).len()
}

/// Verifica se é uma stopword comum (português ou inglês)
pub fn is_stopword(word: &str) -> bool {
    const STOPWORDS: &[&str] = &[
        // português
        "a", "à", "às", "ao", "aos", "o", "os", "as", "um", "uma", "uns", "umas", "de", "do",
        "da", "dos", "das", "em", "no", "na", "nos", "nas", "num", "numa", "por", "pelo", "pela",
        "pelos", "pelas", "para", "pra", "com", "sem", "sob", "sobre", "entre", "até", "e", "ou",
        "mas", "que", "se", "como", "quando", "onde", "este", "esta", "estes", "estas", "isto",
        "esse", "essa", "esses", "essas", "isso", "aquele", "aquela", "aqueles", "aquelas",
        "aquilo", "é", "são", "ser", "foi", "foram", "era", "eram", "está", "estão", "estar",
        "ter", "tem", "têm", "há", "muito", "muita", "muitos", "muitas", "mais", "menos", "já",
        "também", "ele", "ela", "eles", "elas", "lhe", "lhes", "seu", "sua", "seus", "suas",
        "meu", "minha", "nosso", "nossa", "eu", "nós", "você", "vocês", "me", "te", "nos",
        "mesmo", "mesma", "só", "ainda", "então", "porque", "pois", "cada", "todo", "toda",
        "todos", "todas",
        // inglês
        "the", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
        "did", "will", "would", "this", "that", "these", "those", "what", "which", "who", "whom",
        "it", "its", "they", "them", "their", "he", "she", "his", "her", "we", "you", "i",
        "very", "so", "than", "too", "just", "also", "all", "each", "some", "such",
    ];

    let lower = word.to_lowercase();
    STOPWORDS.contains(&lower.as_str())
}

/// Similaridade de Jaccard entre dois conjuntos de palavras
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Cosseno entre conjuntos (coeficiente de Ochiai)
pub fn set_cosine(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return if a.is_empty() && b.is_empty() { 1.0 } else { 0.0 };
    }
    let intersection = a.intersection(b).count() as f32;
    (intersection / ((a.len() * b.len()) as f32).sqrt()).clamp(0.0, 1.0)
}

/// Fração das palavras de conteúdo da origem presentes nos destinos
pub fn content_coverage(source: &str, targets: &[&str]) -> f32 {
    let source_words = content_set(source);
    if source_words.is_empty() {
        return 0.0;
    }
    let target_words: HashSet<String> = targets.iter().flat_map(|t| content_words(t)).collect();
    let covered = source_words.intersection(&target_words).count();
    covered as f32 / source_words.len() as f32
}

/// Fração das palavras de conteúdo do destino ausentes na origem
pub fn content_novelty(source: &str, target: &str) -> f32 {
    let target_words = content_set(target);
    if target_words.is_empty() {
        return 0.0;
    }
    let source_words = content_set(source);
    let novel = target_words.difference(&source_words).count();
    novel as f32 / target_words.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_offsets() {
        let text = "Olá, mundo! Guarda-chuva d'água.";
        let tokens = tokenize(text);
        let words: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(words, vec!["Olá", "mundo", "Guarda-chuva", "d'água"]);
        for token in &tokens {
            assert_eq!(&text[token.start..token.end], token.text);
        }
    }

    #[test]
    fn test_content_words_skip_stopwords() {
        let words = content_words("Este é um texto muito complexo que precisa ser simplificado");
        assert_eq!(words, vec!["texto", "complexo", "precisa", "simplificado"]);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("Hello world test"), 3);
        assert_eq!(word_count("  multiple   spaces  "), 2);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_jaccard_and_set_cosine() {
        let a: HashSet<String> = ["texto", "complexo"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["texto", "simples"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
        assert!((set_cosine(&a, &b) - 0.5).abs() < 1e-6);
        assert_eq!(set_cosine(&a, &HashSet::new()), 0.0);
    }

    #[test]
    fn test_coverage_of_split_sentence() {
        let coverage = content_coverage(
            "Este é um texto muito complexo que precisa ser simplificado para melhor entendimento.",
            &["Este texto é complexo.", "Precisa ser simplificado."],
        );
        assert!((coverage - 4.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_novelty() {
        assert_eq!(content_novelty("O gato dorme.", "O gato dorme."), 0.0);
        assert!(content_novelty("O gato dorme.", "O gato preto dorme muito.") > 0.3);
    }
}
