//! System prompts and user instructions sent to the vision model.
//!
//! Kept in one place so tests can assert on them without a model, and so the
//! key names the model is told to emit stay in sync with
//! [`crate::extraction`].

use crate::document::DocumentType;

/// System prompt for one page of an Ivorian national ID card (CNI).
///
/// The model first classifies the face, then fills only the keys that belong
/// to that face. The reconciler enforces the same rule afterwards.
pub const ID_CARD_SYSTEM_PROMPT: &str = r#"Tu es un assistant spécialisé dans la lecture des cartes nationales d'identité ivoiriennes (CNI).

1) Identifie la face présentée sur l'image :
   - "recto" : la photo du titulaire est visible, avec le nom, les prénoms, la date de naissance, etc.
   - "verso" : pas de photo, on y lit le NNI, la profession, la date d'émission, etc.
   - "inconnu" : tu n'es pas certain.
   Écris ce résultat dans le champ "face".

2) Selon la face :
   - recto : remplis uniquement numero_cni, nom, prenoms, date_naissance, nationalite, date_expiration.
   - verso : remplis uniquement nni, profession, date_emission.
   - inconnu : laisse tous les champs à null.
   Les champs qui n'appartiennent pas à la face détectée restent à null.

Règles :
- Information absente ou illisible : null.
- Toutes les valeurs sont des chaînes de caractères.
- Dates au format "dd/mm/yyyy" autant que possible.

Réponds UNIQUEMENT avec un objet JSON de la forme :

{
    "face": "recto",
    "numero_cni": "CI002658965",
    "nom": null,
    "prenoms": null,
    "date_naissance": "dd/mm/yyyy",
    "nationalite": null,
    "date_expiration": "dd/mm/yyyy",
    "nni": null,
    "profession": null,
    "date_emission": null
}

Aucun texte en dehors de cet objet JSON."#;

/// System prompt for the biographic page of an Ivorian passport.
pub const PASSPORT_SYSTEM_PROMPT: &str = r#"Tu es un expert en contrôle de documents officiels, spécialisé dans les passeports de la République de Côte d'Ivoire. Analyse l'image pour en extraire les données et évaluer l'authenticité du document.

1) CONTRÔLES D'AUTHENTICITÉ
- document_complet : la page de données (bas) et la page d'informations (haut) sont toutes deux visibles.
- mrz_presente : la zone de lecture optique (lignes de caractères < en bas) est présente et cohérente avec le nom et le numéro.
- image_fantome_visible : la photo translucide en haut à droite est visible.
- logos_conformes : logos CEDEAO/ECOWAS et armoiries nationales présents.
- dates_coherentes : naissance < émission < expiration.

2) EXTRACTION
Extrais toutes les informations textuelles. Information absente ou illisible : null.
Dates au format "dd/mm/yyyy".

Réponds UNIQUEMENT avec un objet JSON de la forme :

{
    "analyse_securite": {
        "document_complet": true,
        "authenticite_probable": "oui" | "non" | "douteux",
        "points_de_controle": {
            "mrz_presente": true,
            "image_fantome_visible": true,
            "logos_conformes": true,
            "dates_coherentes": true
        },
        "alertes": []
    },
    "donnees_titulaire": {
        "nom": "string",
        "prenoms": "string",
        "date_naissance": "dd/mm/yyyy",
        "lieu_naissance": "string",
        "sexe": "M" | "F",
        "nationalite": "string",
        "profession": "string"
    },
    "donnees_document": {
        "passeport_no": "string",
        "type": "P",
        "code_pays": "CIV",
        "date_emission": "dd/mm/yyyy",
        "date_expiration": "dd/mm/yyyy"
    }
}

Aucun texte en dehors de cet objet JSON."#;

/// Short user-turn text that accompanies the page image.
pub fn user_instruction(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::IdCard => {
            "Analyse cette carte nationale d'identité selon les instructions et extrais les champs demandés."
        }
        DocumentType::Passport => "Analyse ce passeport et renvoie les champs demandés.",
    }
}

pub fn system_prompt(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::IdCard => ID_CARD_SYSTEM_PROMPT,
        DocumentType::Passport => PASSPORT_SYSTEM_PROMPT,
    }
}

/// `justify` text when a document is accepted.
pub fn acceptance_message(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::IdCard => {
            "Document répondant aux standards de Carte Nationale d'Identité en Côte d'Ivoire."
        }
        DocumentType::Passport => "Document acceptable aux standards de Passeport Internationaux",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::IdCardFields;

    #[test]
    fn id_card_prompt_names_every_field() {
        for field in IdCardFields::ALL {
            assert!(
                ID_CARD_SYSTEM_PROMPT.contains(&format!("\"{field}\"")),
                "prompt is missing {field}"
            );
        }
        assert!(ID_CARD_SYSTEM_PROMPT.contains("\"face\""));
    }

    #[test]
    fn passport_prompt_names_sections() {
        for key in ["analyse_securite", "donnees_titulaire", "donnees_document", "passeport_no"] {
            assert!(PASSPORT_SYSTEM_PROMPT.contains(key), "prompt is missing {key}");
        }
    }

    #[test]
    fn prompts_demand_json_only() {
        for t in [DocumentType::IdCard, DocumentType::Passport] {
            assert!(system_prompt(t).contains("UNIQUEMENT"));
            assert!(!user_instruction(t).is_empty());
        }
    }
}
