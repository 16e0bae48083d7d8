//! Russian noun inflection for user-facing messages.
//!
//! Each resource names its object once (nominative singular plus gender) and
//! every message derives the case it needs from [`NounForms`]. Rules cover
//! single nouns; the stem ending selects the declension row.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Masculine,
    Feminine,
    Neuter,
}

struct Declension {
    drop_last: bool,
    genitive: &'static str,
    /// `None` keeps the nominative form.
    accusative: Option<&'static str>,
    instrumental: &'static str,
    plural: &'static str,
    genitive_plural: &'static str,
}

struct Agreement {
    new_genitive: &'static str,
    found: &'static str,
    created: &'static str,
    updated: &'static str,
    deleted: &'static str,
}

const MASCULINE_HARD: Declension = Declension {
    drop_last: false,
    genitive: "а",
    accusative: None,
    instrumental: "ом",
    plural: "ы",
    genitive_plural: "ов",
};

const MASCULINE_SIBILANT: Declension = Declension {
    drop_last: false,
    genitive: "а",
    accusative: None,
    instrumental: "ом",
    plural: "и",
    genitive_plural: "ей",
};

const MASCULINE_SOFT: Declension = Declension {
    drop_last: true,
    genitive: "я",
    accusative: None,
    instrumental: "ем",
    plural: "и",
    genitive_plural: "ей",
};

const MASCULINE_SHORT_I: Declension = Declension {
    drop_last: true,
    genitive: "я",
    accusative: None,
    instrumental: "ем",
    plural: "и",
    genitive_plural: "ев",
};

const FEMININE_SOFT: Declension = Declension {
    drop_last: true,
    genitive: "и",
    accusative: None,
    instrumental: "ью",
    plural: "и",
    genitive_plural: "ей",
};

const FEMININE_YA: Declension = Declension {
    drop_last: true,
    genitive: "и",
    accusative: Some("ю"),
    instrumental: "ей",
    plural: "и",
    genitive_plural: "й",
};

const FEMININE_HARD: Declension = Declension {
    drop_last: true,
    genitive: "ы",
    accusative: Some("у"),
    instrumental: "ой",
    plural: "ы",
    genitive_plural: "",
};

const NEUTER_SOFT: Declension = Declension {
    drop_last: true,
    genitive: "я",
    accusative: None,
    instrumental: "ем",
    plural: "я",
    genitive_plural: "й",
};

const NEUTER_HARD: Declension = Declension {
    drop_last: true,
    genitive: "а",
    accusative: None,
    instrumental: "ом",
    plural: "а",
    genitive_plural: "",
};

const MASCULINE_AGREEMENT: Agreement = Agreement {
    new_genitive: "нового",
    found: "найден",
    created: "создан",
    updated: "обновлен",
    deleted: "удален",
};

const FEMININE_AGREEMENT: Agreement = Agreement {
    new_genitive: "новой",
    found: "найдена",
    created: "создана",
    updated: "обновлена",
    deleted: "удалена",
};

const NEUTER_AGREEMENT: Agreement = Agreement {
    new_genitive: "нового",
    found: "найдено",
    created: "создано",
    updated: "обновлено",
    deleted: "удалено",
};

fn declension(gender: Gender, last: Option<char>) -> &'static Declension {
    match (gender, last) {
        (Gender::Masculine, Some('ь')) => &MASCULINE_SOFT,
        (Gender::Masculine, Some('й')) => &MASCULINE_SHORT_I,
        (Gender::Masculine, Some('ж' | 'ш' | 'ч' | 'щ')) => &MASCULINE_SIBILANT,
        (Gender::Masculine, _) => &MASCULINE_HARD,
        (Gender::Feminine, Some('ь')) => &FEMININE_SOFT,
        (Gender::Feminine, Some('я')) => &FEMININE_YA,
        (Gender::Feminine, _) => &FEMININE_HARD,
        (Gender::Neuter, Some('е')) => &NEUTER_SOFT,
        (Gender::Neuter, _) => &NEUTER_HARD,
    }
}

fn agreement(gender: Gender) -> &'static Agreement {
    match gender {
        Gender::Masculine => &MASCULINE_AGREEMENT,
        Gender::Feminine => &FEMININE_AGREEMENT,
        Gender::Neuter => &NEUTER_AGREEMENT,
    }
}

/// Inflected forms of one object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NounForms {
    pub nominative: String,
    pub genitive: String,
    pub accusative: String,
    pub instrumental: String,
    pub plural: String,
    pub genitive_plural: String,
    pub new_genitive: &'static str,
    pub found: &'static str,
    pub created: &'static str,
    pub updated: &'static str,
    pub deleted: &'static str,
}

impl NounForms {
    pub fn new(object_name: &str, gender: Gender) -> Self {
        let nominative = object_name.trim().to_lowercase();
        let last = nominative.chars().last();
        let rule = declension(gender, last);
        let stem = if rule.drop_last {
            let mut chars = nominative.chars();
            chars.next_back();
            chars.as_str().to_string()
        } else {
            nominative.clone()
        };
        let agreement = agreement(gender);

        Self {
            genitive: format!("{stem}{}", rule.genitive),
            accusative: match rule.accusative {
                Some(ending) => format!("{stem}{ending}"),
                None => nominative.clone(),
            },
            instrumental: format!("{stem}{}", rule.instrumental),
            plural: format!("{stem}{}", rule.plural),
            genitive_plural: format!("{stem}{}", rule.genitive_plural),
            nominative,
            new_genitive: agreement.new_genitive,
            found: agreement.found,
            created: agreement.created,
            updated: agreement.updated,
            deleted: agreement.deleted,
        }
    }

    pub fn title(&self) -> String {
        capitalize(&self.nominative)
    }

    pub fn not_found(&self) -> String {
        format!("{} не {}", self.title(), self.found)
    }

    pub fn deleted_successfully(&self) -> String {
        format!("{} успешно {}", self.title(), self.deleted)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
