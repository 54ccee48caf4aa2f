/// Prompt size limits for the analysis chains.
#[derive(Debug, Clone)]
pub struct AnalysisTuning {
    pub answer_context_chars: usize,
    pub report_context_chars: usize,
}

impl Default for AnalysisTuning {
    fn default() -> Self {
        Self {
            answer_context_chars: 500_000,
            report_context_chars: 500_000,
        }
    }
}
