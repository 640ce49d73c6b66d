//! Word lists for `{{RANDOM TEXT}}` and `{{RANDOM EMAIL}}`.

const EN: &[&str] = &[
    "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "river", "stone", "light",
    "window", "garden", "silver", "morning", "paper", "market", "bridge", "winter", "story",
    "music", "number", "harbor", "forest", "yellow", "engine", "letter", "planet", "simple",
    "travel", "orange", "friend", "summer", "question", "answer", "little", "before", "after",
    "between", "always",
];

const DE: &[&str] = &[
    "der", "die", "das", "und", "haus", "baum", "wasser", "sonne", "strasse", "fenster",
    "garten", "morgen", "abend", "freund", "brief", "stadt", "wald", "berg", "schnell",
    "langsam", "immer", "heute", "gestern", "zeitung", "blume", "winter", "sommer", "kirche",
    "bahnhof", "brücke", "grün", "schön", "klein", "gross", "frage", "antwort", "zwischen",
    "vielleicht", "arbeit", "leben",
];

const FR: &[&str] = &[
    "le", "la", "les", "et", "maison", "arbre", "eau", "soleil", "rue", "fenêtre", "jardin",
    "matin", "soir", "ami", "lettre", "ville", "forêt", "montagne", "rapide", "lent",
    "toujours", "aujourd'hui", "hier", "journal", "fleur", "hiver", "été", "église", "gare",
    "pont", "vert", "beau", "petit", "grand", "question", "réponse", "entre", "peut-être",
    "travail", "vie",
];

const LA: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua",
    "enim", "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris",
    "nisi", "aliquip", "ex", "ea", "commodo", "consequat", "duis", "aute", "irure", "in",
    "reprehenderit", "voluptate",
];

pub const FIRST_NAMES: &[&str] = &[
    "anna", "ben", "clara", "david", "emma", "felix", "greta", "hugo", "ida", "jonas", "karla",
    "leon", "mia", "noah", "olga", "paul", "rosa", "sam", "tina", "victor",
];

pub const LAST_NAMES: &[&str] = &[
    "adams", "becker", "carter", "dubois", "evans", "fischer", "garcia", "hansen", "ito",
    "jensen", "keller", "lopez", "martin", "novak", "olsen", "peters", "rossi", "schmidt",
    "turner", "weber",
];

pub fn corpus(lang: &str) -> Option<&'static [&'static str]> {
    match lang {
        "en" => Some(EN),
        "de" => Some(DE),
        "fr" => Some(FR),
        "la" => Some(LA),
        _ => None,
    }
}
