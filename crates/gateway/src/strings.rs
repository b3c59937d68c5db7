//! Fixed user-facing sentences the orchestrator falls back to when there
//! is no template or LLM turn to render one (escalation acknowledgment,
//! confirmation cancellation, an unclear yes/no, the recursion-limit
//! fallback, a transient upstream failure, a language change
//! confirmation). An expired confirmation has no sentence of its own —
//! it's cleared and the turn restarts as if freshly received (§4.K step
//! 2). English-first with a Spanish variant keyed by
//! [`Session::language`](sa_domain::session::Session), matching every
//! other locale-aware surface in this codebase rather than the
//! Spanish-only literals of the system this one replaces.

#[derive(Debug, Clone, Copy)]
pub enum FixedSentence {
    Escalated,
    ConfirmationCancelled,
    ConfirmationUnclear,
    RecursionLimitExceeded,
    TransientFailure,
    LanguageChanged,
}

impl FixedSentence {
    pub fn for_language(self, language: &str) -> &'static str {
        let (en, es) = self.pair();
        if language.eq_ignore_ascii_case("es") {
            es
        } else {
            en
        }
    }

    fn pair(self) -> (&'static str, &'static str) {
        match self {
            FixedSentence::Escalated => (
                "I'm connecting you with a human agent who can help further. Someone will be with you shortly.",
                "Te estoy conectando con un agente humano que puede ayudarte más. En breve te atenderán.",
            ),
            FixedSentence::ConfirmationCancelled => (
                "Okay, I've cancelled that.",
                "De acuerdo, he cancelado eso.",
            ),
            FixedSentence::ConfirmationUnclear => (
                "Sorry, I didn't catch whether that's a yes or no — could you confirm?",
                "Perdona, no entendí si es un sí o un no — ¿puedes confirmarlo?",
            ),
            FixedSentence::RecursionLimitExceeded => (
                "I wasn't able to figure out how to help with that — could you rephrase?",
                "No logré entender cómo ayudarte con eso — ¿podrías reformularlo?",
            ),
            FixedSentence::TransientFailure => (
                "Something went wrong on my end — please try again in a moment.",
                "Algo salió mal de mi lado — por favor intenta de nuevo en un momento.",
            ),
            FixedSentence::LanguageChanged => (
                "Language changed to English.",
                "Idioma cambiado a español.",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_english_for_unknown_language() {
        assert_eq!(
            FixedSentence::Escalated.for_language("fr"),
            FixedSentence::Escalated.pair().0
        );
    }

    #[test]
    fn selects_spanish_case_insensitively() {
        assert_eq!(
            FixedSentence::ConfirmationCancelled.for_language("ES"),
            FixedSentence::ConfirmationCancelled.pair().1
        );
    }
}
