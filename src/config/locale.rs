//! User-visible strings in English and French.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Language of the interface messages (not of the synthesized speech).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UiLocale {
    #[default]
    En,
    Fr,
}

/// Message table for one locale.
#[derive(Debug)]
pub struct Messages {
    pub enter_text: &'static str,
    pub generation_failed: &'static str,
    pub unexpected_error: &'static str,
    pub generating: &'static str,
    pub generation_busy: &'static str,
    pub enter_api_key: &'static str,
    pub api_key_saved: &'static str,
    pub api_key_save_failed: &'static str,
    pub api_key_required: &'static str,
    pub file_saved: &'static str,
    pub file_save_failed: &'static str,
    pub saving: &'static str,
    pub save_busy: &'static str,
    pub breaks_applied: &'static str,
    pub no_audio: &'static str,
    pub output_unavailable: &'static str,
    pub near_limit: &'static str,
    pub text_truncated: &'static str,
    pub text_too_long: &'static str,
    pub save_prompt: &'static str,
}

const EN: Messages = Messages {
    enter_text: "Please enter some text",
    generation_failed: "Failed to generate audio",
    unexpected_error: "An unexpected error occurred",
    generating: "Generating...",
    generation_busy: "A generation is already in progress",
    enter_api_key: "Please enter an API key",
    api_key_saved: "API key saved successfully!",
    api_key_save_failed: "Failed to save API key",
    api_key_required: "An ElevenLabs API key is required. Use: key <YOUR_API_KEY>",
    file_saved: "File saved successfully!",
    file_save_failed: "Failed to save file",
    saving: "Saving...",
    save_busy: "A save is already in progress",
    breaks_applied: "Pauses applied",
    no_audio: "No audio loaded",
    output_unavailable: "Audio output unavailable; the audio can still be saved with: save",
    near_limit: "Approaching the character limit",
    text_truncated: "Character limit reached, the end of the text was cut",
    text_too_long: "Text exceeds the 5000 character limit",
    save_prompt: "Save as (Enter for default, '-' to cancel)",
};

const FR: Messages = Messages {
    enter_text: "Veuillez entrer du texte",
    generation_failed: "Échec de la génération audio",
    unexpected_error: "Une erreur inattendue s'est produite",
    generating: "Génération en cours...",
    generation_busy: "Une génération est déjà en cours",
    enter_api_key: "Veuillez entrer une clé API",
    api_key_saved: "Clé API enregistrée avec succès !",
    api_key_save_failed: "Échec de l'enregistrement de la clé API",
    api_key_required: "Une clé API ElevenLabs est requise. Utilisez : key <VOTRE_CLE_API>",
    file_saved: "Fichier enregistré avec succès !",
    file_save_failed: "Échec de l'enregistrement du fichier",
    saving: "Enregistrement...",
    save_busy: "Un enregistrement est déjà en cours",
    breaks_applied: "Pauses appliquées",
    no_audio: "Aucun audio chargé",
    output_unavailable: "Sortie audio indisponible ; l'audio peut encore être enregistré avec : save",
    near_limit: "Limite de caractères bientôt atteinte",
    text_truncated: "Limite de caractères atteinte, la fin du texte a été coupée",
    text_too_long: "Le texte dépasse la limite de 5000 caractères",
    save_prompt: "Enregistrer sous (Entrée pour le nom par défaut, '-' pour annuler)",
};

impl UiLocale {
    /// Message table for this locale.
    pub fn messages(self) -> &'static Messages {
        match self {
            UiLocale::En => &EN,
            UiLocale::Fr => &FR,
        }
    }
}

impl std::fmt::Display for UiLocale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiLocale::En => write!(f, "en"),
            UiLocale::Fr => write!(f, "fr"),
        }
    }
}
