//! Deterministic query analysis.
//!
//! Extracts article references, code names and legal concepts from a
//! question, derives candidate search phrases from them, and proposes
//! alternatives after a search comes back empty. No model or network
//! access: everything here is a pure function of the query text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::sources::SourceKind;

/// Maximum number of angles returned by [`decompose_query_into_angles`].
pub const MAX_ANGLES: usize = 8;

/// Maximum number of alternatives returned by [`generate_alternative_queries`].
pub const MAX_ALTERNATIVES: usize = 6;

static RE_ARTICLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:articles?|art\.?)\s*(\d+(?:[:/.\-]\d+)*(?:\s*(?:bis|ter|quater)\b)?)",
    )
    .ok()
});

// ── Known codes and laws ──────────────────────────────────────────────────
const CODE_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)\bcode\s+civil\b|\bburgerlijk\s+wetboek\b", "Code civil"),
    (r"(?i)\bcode\s+judiciaire\b|\bgerechtelijk\s+wetboek\b", "Code judiciaire"),
    (r"(?i)\bcode\s+p[ée]nal\b|\bstrafwetboek\b", "Code pénal"),
    (
        r"(?i)\bcode\s+d['’]instruction\s+criminelle\b",
        "Code d'instruction criminelle",
    ),
    (
        r"(?i:\bcode\s+des\s+soci[ée]t[ée]s(?:\s+et\s+des\s+associations)?\b)|\bCSA\b",
        "Code des sociétés et des associations",
    ),
    (
        r"(?i:\bcode\s+de\s+droit\s+[ée]conomique\b)|\bCDE\b",
        "Code de droit économique",
    ),
    (
        r"(?i:\bcode\s+des\s+imp[ôo]ts\s+sur\s+les\s+revenus\b)|\bCIR\b",
        "Code des impôts sur les revenus 1992",
    ),
    (r"(?i)\bcode\s+de\s+la\s+tva\b", "Code de la TVA"),
    (r"(?i)\bcode\s+de\s+la\s+route\b", "Code de la route"),
    (
        r"(?i)\bcode\s+de\s+la\s+nationalit[ée]\b",
        "Code de la nationalité belge",
    ),
    (
        r"(?i)\bcode\s+bruxellois\s+du\s+logement\b",
        "Code bruxellois du Logement",
    ),
    (
        r"(?i)\bcode\s+wallon\s+de\s+l['’]habitation\b",
        "Code wallon de l'habitation durable",
    ),
    (
        r"(?i)\bloi\s+(?:du\s+3\s+juillet\s+1978\s+)?(?:relative\s+aux|sur\s+les)\s+contrats\s+de\s+travail\b",
        "Loi relative aux contrats de travail",
    ),
    (r"(?i)\bconstitution\b|\bgrondwet\b", "Constitution"),
];

// ── Legal concepts vocabulary ─────────────────────────────────────────────
const CONCEPT_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)\bcomp[ée]ten(?:ce|t|te)s?\b", "compétence"),
    (r"(?i)\b(?:juges?|justices?)\s+de\s+paix\b", "juge de paix"),
    (
        r"(?i)\btribunal\s+de\s+premi[èe]re\s+instance\b",
        "tribunal de première instance",
    ),
    (r"(?i)\btribunal\s+du\s+travail\b", "tribunal du travail"),
    (
        r"(?i)\btribunal\s+de\s+l['’]entreprise\b",
        "tribunal de l'entreprise",
    ),
    (r"(?i)\bbail\s+commercial\b|\bbaux\s+commerciaux\b", "bail commercial"),
    (r"(?i)\bbail\b|\bbaux\b|\blocataires?\b|\bbailleurs?\b", "bail"),
    (r"(?i)\bloyers?\b", "loyer"),
    (r"(?i)\bgarantie\s+locative\b", "garantie locative"),
    (r"(?i)\bexpulsion\b|\bd[ée]guerpissement\b", "expulsion"),
    (r"(?i)\br[ée]siliation\b|\br[ée]silier\b", "résiliation"),
    (r"(?i)\bpr[ée]avis\b|\bcong[ée]\b", "préavis"),
    (r"(?i)\blicenci(?:ement|er|[ée]e?)s?\b", "licenciement"),
    (r"(?i)\bmotifs?\s+graves?\b", "motif grave"),
    (r"(?i)\bcontrats?\s+de\s+travail\b", "contrat de travail"),
    (r"(?i)\bdivorces?\b", "divorce"),
    (r"(?i)\bpensions?\s+alimentaires?\b", "pension alimentaire"),
    (
        r"(?i)\bh[ée]bergement\b|\bgarde\s+des?\s+enfants?\b",
        "hébergement des enfants",
    ),
    (
        r"(?i)\bresponsabilit[ée]\s+(?:civile|extra-?contractuelle)\b",
        "responsabilité civile",
    ),
    (r"(?i)\bfautes?\b", "faute"),
    (r"(?i)\bdommages?\b|\bpr[ée]judices?\b", "dommage"),
    (r"(?i)\bprescri(?:ption|t|te|re)s?\b", "prescription"),
    (r"(?i)\bvices?\s+cach[ée]s?\b", "vices cachés"),
    (r"(?i)\bsuccessions?\b|\bh[ée]ritiers?\b|\btestaments?\b", "succession"),
    (r"(?i)\bcopropri[ée]t[ée]\b", "copropriété"),
    (r"(?i)\bservitudes?\b", "servitude"),
    (r"(?i)\badministrateurs?\b", "responsabilité des administrateurs"),
    (r"(?i)\bappel\b|\binterjeter\b", "appel"),
    (r"(?i)\bastreintes?\b", "astreinte"),
    (r"(?i)\bd[ée]lais?\b", "délai"),
];

// ── Co-occurrence rules: all concepts present → compound searches ─────────
const COOCCURRENCE_RULES: &[(&[&str], &[&str])] = &[
    (
        &["compétence", "juge de paix"],
        &[
            "compétence matérielle juge de paix",
            "article 591 Code judiciaire",
            "compétence juge de paix",
        ],
    ),
    (
        &["compétence", "bail"],
        &["compétence juge de paix bail", "article 591 Code judiciaire"],
    ),
    (
        &["bail", "préavis"],
        &["congé bail de résidence principale", "préavis bail"],
    ),
    (&["bail", "résiliation"], &["résiliation du bail"]),
    (
        &["licenciement", "motif grave"],
        &[
            "licenciement pour motif grave",
            "article 35 loi contrats de travail",
        ],
    ),
    (
        &["licenciement", "préavis"],
        &[
            "indemnité compensatoire de préavis",
            "délai de préavis licenciement",
        ],
    ),
    (
        &["divorce", "pension alimentaire"],
        &["pension alimentaire après divorce"],
    ),
    (
        &["faute", "dommage"],
        &["faute dommage lien causal", "article 1382 Code civil"],
    ),
    (
        &["responsabilité civile", "prescription"],
        &["prescription action en responsabilité extracontractuelle"],
    ),
];

const STOPWORDS: &[&str] = &[
    // French
    "le", "la", "les", "l", "un", "une", "des", "de", "du", "d", "et", "ou", "en", "au", "aux",
    "a", "à", "pour", "par", "sur", "dans", "avec", "sans", "est", "sont", "être", "que", "qui",
    "quoi", "quel", "quelle", "quels", "quelles", "comment", "pourquoi", "quand", "ce", "cette",
    "ces", "mon", "ma", "mes", "son", "sa", "ses", "leur", "leurs", "il", "elle", "ils", "elles",
    "on", "nous", "vous", "je", "j", "tu", "y", "ne", "pas", "plus", "peut", "puis", "dois",
    "doit", "faut", "qu", "s", "se", "si", "n", "c", "m", "t",
    // English
    "the", "an", "of", "in", "on", "for", "to", "is", "are", "what", "how", "when", "which",
    "can", "does", "do", "my", "with", "and", "or", "i",
];

static CODE_TABLE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| compile(CODE_PATTERNS));

static CONCEPT_TABLE: LazyLock<Vec<(Regex, &'static str)>> =
    LazyLock::new(|| compile(CONCEPT_PATTERNS));

fn compile(patterns: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    patterns
        .iter()
        .filter_map(|(pattern, name)| Regex::new(pattern).ok().map(|re| (re, *name)))
        .collect()
}

/// Lowercased, whitespace-collapsed form used for comparisons.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn push_unique(list: &mut Vec<String>, candidate: String) {
    let key = normalize_query(&candidate);
    if key.is_empty() || list.iter().any(|existing| normalize_query(existing) == key) {
        return;
    }
    list.push(candidate);
}

/// Article references, normalized to `"article <ref>"`, in order of first
/// appearance and without duplicates.
pub fn extract_article_references(query: &str) -> Vec<String> {
    let Some(re) = RE_ARTICLE.as_ref() else {
        return Vec::new();
    };
    let mut articles = Vec::new();
    for caps in re.captures_iter(query) {
        if let Some(reference) = caps.get(1) {
            let reference = reference
                .as_str()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            push_unique(&mut articles, format!("article {}", reference));
        }
    }
    articles
}

/// Canonical names of the codes and laws mentioned in the query.
pub fn extract_code_names(query: &str) -> Vec<String> {
    CODE_TABLE
        .iter()
        .filter(|(re, _)| re.is_match(query))
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Legal concepts of the fixed vocabulary found in the query.
pub fn extract_legal_concepts(query: &str) -> Vec<String> {
    let mut concepts: Vec<String> = Vec::new();
    for (re, name) in CONCEPT_TABLE.iter() {
        if !re.is_match(query) {
            continue;
        }
        // "bail commercial" already implies "bail"
        if concepts.iter().any(|c| c.starts_with(name)) {
            continue;
        }
        concepts.push(name.to_string());
    }
    concepts
}

/// The query with stopwords and punctuation removed.
pub fn keyword_query(query: &str) -> String {
    query
        .split(|c: char| c.is_whitespace() || c == '\'' || c == '’')
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .filter(|word| !STOPWORDS.contains(&word.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `article X Code` combinations, or bare articles when no code is named.
fn article_code_combinations(articles: &[String], codes: &[String]) -> Vec<String> {
    if codes.is_empty() {
        return articles.to_vec();
    }
    articles
        .iter()
        .flat_map(|article| codes.iter().map(move |code| format!("{} {}", article, code)))
        .collect()
}

fn pairwise(terms: &[String]) -> Vec<String> {
    let mut pairs = Vec::new();
    for (i, first) in terms.iter().enumerate() {
        for second in &terms[i + 1..] {
            pairs.push(format!("{} {}", first, second));
        }
    }
    pairs
}

/// Candidate search phrases, most specific (longest) first, at most
/// [`MAX_ANGLES`].
pub fn decompose_query_into_angles(query: &str) -> Vec<String> {
    let articles = extract_article_references(query);
    let codes = extract_code_names(query);
    let concepts = extract_legal_concepts(query);

    let mut candidates = Vec::new();
    for (required, compounds) in COOCCURRENCE_RULES {
        if required.iter().all(|r| concepts.iter().any(|c| c == r)) {
            for compound in *compounds {
                push_unique(&mut candidates, compound.to_string());
            }
        }
    }
    for combo in article_code_combinations(&articles, &codes) {
        push_unique(&mut candidates, combo);
    }
    if let Some(concept) = concepts.first() {
        for code in &codes {
            push_unique(&mut candidates, format!("{} {}", code, concept));
        }
    }
    for pair in pairwise(&concepts) {
        push_unique(&mut candidates, pair);
    }
    for concept in &concepts {
        push_unique(&mut candidates, concept.clone());
    }

    candidates.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    candidates.truncate(MAX_ANGLES);
    candidates
}

/// Search phrases suited to the keyword-based legislation search:
/// article and code combinations first, then code names, then angles.
pub fn legislation_query_candidates(query: &str) -> Vec<String> {
    let articles = extract_article_references(query);
    let codes = extract_code_names(query);

    let mut candidates = Vec::new();
    for combo in article_code_combinations(&articles, &codes) {
        push_unique(&mut candidates, combo);
    }
    for code in codes {
        push_unique(&mut candidates, code);
    }
    for angle in decompose_query_into_angles(query) {
        push_unique(&mut candidates, angle);
    }
    candidates
}

/// Fallback searches after `original_query` returned nothing on `source`.
///
/// Never contains the original query (compared case-insensitively) and
/// holds at most [`MAX_ALTERNATIVES`] entries.
pub fn generate_alternative_queries(original_query: &str, source: SourceKind) -> Vec<String> {
    let articles = extract_article_references(original_query);
    let codes = extract_code_names(original_query);
    let concepts = extract_legal_concepts(original_query);
    let keywords = keyword_query(original_query);

    let terms: Vec<String> = articles
        .iter()
        .chain(codes.iter())
        .chain(concepts.iter())
        .cloned()
        .collect();

    let mut ordered: Vec<String> = Vec::new();
    match source {
        SourceKind::Legislation => {
            ordered.extend(article_code_combinations(&articles, &codes));
            ordered.extend(codes.iter().cloned());
            ordered.extend(articles.iter().cloned());
            ordered.extend(pairwise(&terms));
            ordered.push(keywords.clone());
        }
        SourceKind::Jurisprudence => {
            ordered.extend(pairwise(&concepts));
            if let Some(concept) = concepts.first() {
                ordered.extend(codes.iter().map(|code| format!("{} {}", concept, code)));
            }
            ordered.extend(concepts.iter().cloned());
            ordered.push(keywords.clone());
            ordered.extend(pairwise(&terms));
        }
        SourceKind::Rag => {
            ordered.push(keywords.clone());
            ordered.extend(concepts.iter().cloned());
            ordered.extend(pairwise(&terms));
            ordered.extend(articles.iter().cloned());
        }
    }

    // Shorter keyword forms when nothing legal was detected
    let words: Vec<String> = keywords.split_whitespace().map(str::to_string).collect();
    if words.len() > 3 {
        ordered.push(words[..3].join(" "));
        ordered.push(words[words.len() - 3..].join(" "));
    }
    // Keyword pairs, then single keywords
    if words.len() > 1 {
        ordered.extend(pairwise(&words));
        ordered.extend(words);
    }

    let original = normalize_query(original_query);
    let mut alternatives = Vec::new();
    for candidate in ordered {
        if normalize_query(&candidate) == original {
            continue;
        }
        push_unique(&mut alternatives, candidate);
        if alternatives.len() == MAX_ALTERNATIVES {
            break;
        }
    }
    alternatives
}

/// Alternatives for each source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativesBySource {
    pub rag: Vec<String>,
    pub jurisprudence: Vec<String>,
    pub legislation: Vec<String>,
}

/// Full deterministic analysis of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub articles: Vec<String>,
    pub codes: Vec<String>,
    pub concepts: Vec<String>,
    pub angles: Vec<String>,
    pub keywords: String,
    pub alternatives: AlternativesBySource,
}

/// Run every heuristic over `query`.
pub fn analyze_query(query: &str) -> QueryAnalysis {
    QueryAnalysis {
        articles: extract_article_references(query),
        codes: extract_code_names(query),
        concepts: extract_legal_concepts(query),
        angles: decompose_query_into_angles(query),
        keywords: keyword_query(query),
        alternatives: AlternativesBySource {
            rag: generate_alternative_queries(query, SourceKind::Rag),
            jurisprudence: generate_alternative_queries(query, SourceKind::Jurisprudence),
            legislation: generate_alternative_queries(query, SourceKind::Legislation),
        },
    }
}

#[cfg(test)]
#[path = "heuristics_tests.rs"]
mod heuristics_tests;
