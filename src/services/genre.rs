//! Genre canonicalization
//!
//! Upstream services spell genres inconsistently ("Sci-Fi", "science_fiction",
//! "SciFi & Fantasy"). Every label is reduced to a fixed vocabulary by running
//! an ordered rule table over its normalized form; the first matching rule
//! wins. Labels outside every family fall through to word capitalization.

use once_cell::sync::Lazy;

/// One check against a normalized (lower-case, space separated) label
#[derive(Debug, Clone, Copy)]
pub enum Needle {
    /// Substring anywhere in the label
    Contains(&'static str),
    /// Whole space-delimited word
    Word(&'static str),
}

impl Needle {
    fn found_in(&self, label: &str) -> bool {
        match self {
            Needle::Contains(part) => label.contains(part),
            Needle::Word(word) => label.split(' ').any(|w| w == *word),
        }
    }
}

/// A canonical genre and what a label must contain to map to it
///
/// Every inner slice of `all_of` is an any-of set; all sets must hit.
#[derive(Debug)]
pub struct GenreRule {
    pub canonical: &'static str,
    pub all_of: &'static [&'static [Needle]],
}

use Needle::{Contains, Word};

/// Ordered taxonomy. Order matters: "Sci-Fi & Fantasy" is Science Fiction,
/// "Musical" must be tried before "Music".
pub static GENRE_RULES: &[GenreRule] = &[
    GenreRule { canonical: "Science Fiction", all_of: &[&[Contains("sci")], &[Contains("fi")]] },
    GenreRule { canonical: "Documentary", all_of: &[&[Contains("docu"), Word("doc")]] },
    GenreRule { canonical: "Talk Show", all_of: &[&[Word("talk")]] },
    GenreRule { canonical: "Game Show", all_of: &[&[Contains("game")], &[Contains("show")]] },
    GenreRule { canonical: "Reality", all_of: &[&[Contains("reality")]] },
    GenreRule { canonical: "TV Movie", all_of: &[&[Contains("tv movie"), Contains("tvmovie")]] },
    GenreRule { canonical: "Film Noir", all_of: &[&[Contains("noir")]] },
    GenreRule { canonical: "Animation", all_of: &[&[Contains("animat"), Contains("cartoon")]] },
    GenreRule { canonical: "Anime", all_of: &[&[Word("anime")]] },
    GenreRule { canonical: "Action", all_of: &[&[Contains("action")]] },
    GenreRule { canonical: "Adventure", all_of: &[&[Contains("adventur")]] },
    GenreRule { canonical: "Biography", all_of: &[&[Contains("biograph"), Contains("biopic")]] },
    GenreRule { canonical: "Comedy", all_of: &[&[Contains("comed"), Word("comic")]] },
    GenreRule { canonical: "Crime", all_of: &[&[Contains("crime")]] },
    GenreRule { canonical: "Family", all_of: &[&[Contains("famil")]] },
    GenreRule { canonical: "Kids", all_of: &[&[Word("kid"), Word("kids"), Contains("children")]] },
    GenreRule { canonical: "Fantasy", all_of: &[&[Contains("fantas")]] },
    GenreRule { canonical: "History", all_of: &[&[Contains("histor")]] },
    GenreRule { canonical: "Horror", all_of: &[&[Contains("horror")]] },
    GenreRule { canonical: "Musical", all_of: &[&[Contains("musical")]] },
    GenreRule { canonical: "Music", all_of: &[&[Contains("music")]] },
    GenreRule { canonical: "Mystery", all_of: &[&[Contains("myster")]] },
    GenreRule { canonical: "News", all_of: &[&[Word("news")]] },
    GenreRule { canonical: "Romance", all_of: &[&[Contains("romanc"), Contains("romantic")]] },
    GenreRule { canonical: "Sport", all_of: &[&[Contains("sport")]] },
    GenreRule { canonical: "Thriller", all_of: &[&[Contains("thrill"), Contains("suspense")]] },
    GenreRule { canonical: "War", all_of: &[&[Word("war"), Word("wars")]] },
    GenreRule { canonical: "Western", all_of: &[&[Contains("western")]] },
    GenreRule { canonical: "Drama", all_of: &[&[Contains("drama")]] },
    GenreRule { canonical: "Soap", all_of: &[&[Word("soap")]] },
    GenreRule { canonical: "Short", all_of: &[&[Word("short")]] },
];

/// Canonical vocabulary in alphabetical order, for manifest genre options
pub static CANONICAL_GENRES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut genres: Vec<&'static str> = GENRE_RULES.iter().map(|rule| rule.canonical).collect();
    genres.sort_unstable();
    genres.dedup();
    genres
});

/// Lower-case, replace every non-alphanumeric run with one space, trim.
fn normalize(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase().filter(|l| l.is_alphanumeric()));
        } else if !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}

/// Normalized lookup slug shared with the genre filter compiler.
pub fn slug(label: &str) -> String {
    normalize(label)
}

/// Upper-case form of `c` only if lower-casing it gives `c` back
fn reversible_upper(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) if u.to_lowercase().eq(std::iter::once(c)) => u,
        _ => c,
    }
}

fn capitalize_words(normalized: &str) -> String {
    normalized
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => std::iter::once(reversible_upper(first)).chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps an arbitrary genre label onto the canonical vocabulary.
///
/// Returns `None` when the label has no alphanumeric content.
pub fn canonicalize(label: &str) -> Option<String> {
    let normalized = normalize(label);
    if normalized.is_empty() {
        return None;
    }

    let hit = GENRE_RULES.iter().find(|rule| {
        rule.all_of
            .iter()
            .all(|any_of| any_of.iter().any(|needle| needle.found_in(&normalized)))
    });

    Some(match hit {
        Some(rule) => rule.canonical.to_string(),
        None => capitalize_words(&normalized),
    })
}

/// Canonicalizes a genre list, dropping empties and keeping first occurrences.
pub fn canonicalize_all<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        if let Some(genre) = canonicalize(label.as_ref()) {
            if !out.contains(&genre) {
                out.push(genre);
            }
        }
    }
    out
}
