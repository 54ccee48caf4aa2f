pub static METRICS_EXTRACTION_INSTRUCTIONS: &str = r#"You are an expert financial data extractor.
Extract key historical financial metrics from the text of an annual report.
The text contains markers like [Page X]; use them to cite the source page of every metric.

Instructions:
1. Reporting currency: identify the currency symbol (₹, $, ...) and the unit (Crores, Millions, ...).
2. Trends: extract the last 3 to 5 years for each metric, not a single year.
   - Operating cash flow comes from the cash flow statement.
   - Return on equity usually sits in the financial ratios or key highlights section, as a percentage.

Metrics:
1. Revenue
2. Operating profit (EBIT)
3. Earnings per share (EPS)
4. Operating cash flow
5. Return on equity (RoE, %)

Respond with JSON only, in exactly this shape:
{
  "meta": {"currency_symbol": "₹", "currency_unit": "Crores"},
  "revenue": {"data": [{"year": "FY24", "value": 12345}], "citation": "Annual Report 2023-24 Page 22"},
  "operating_profit": {"data": [{"year": "FY24", "value": 3456}], "citation": "Annual Report 2023-24 Page 22"},
  "eps": {"data": [{"year": "FY24", "value": 125.5}], "citation": "Annual Report 2023-24 Page 23"},
  "cash_flow": {"data": [{"year": "FY24", "value": 40000}], "citation": "Annual Report 2023-24 Page 23"},
  "roe": {"data": [{"year": "FY24", "value": 52.2}], "citation": "Annual Report 2023-24 Page 23"},
  "summary": "A concise 2-3 sentence executive summary of performance, strategy and highlights."
}
If a metric is missing, return an empty list for its data."#;

pub static VERIFICATION_INSTRUCTIONS: &str = r"You are a database verification auditor.
Verify the extracted JSON against the source text.

1. Check that every value in the JSON matches the source text exactly.
2. Return on equity values must be percentages (52.2, not 0.522).
3. If there is a meaningful discrepancy, output the corrected JSON.
4. If the JSON is correct, return it unchanged.

Output strictly valid JSON with the same shape as the input.";

pub static IDENTIFICATION_INSTRUCTIONS: &str = r#"Identify the publicly listed NSE ticker of the company that published this annual report.

1. Read the text below, extracted from the first pages of the report.
2. Identify the specific company (for example "Tata Motors", "Infosys", "Reliance Industries").
3. Return its exact NSE ticker symbol.

Rules:
- Group names are ambiguous: if the text mentions "Tata", decide WHICH Tata company (TATAMOTORS, TATASTEEL, TCS, TATACHEM).
- If it mentions "Adani", decide WHICH Adani company (ADANIENT, ADANIPORTS).

Respond with JSON only:
{"ticker": "SYMBOL"}"#;

pub fn metrics_extraction_prompt(filename: &str, text: &str) -> String {
    format!("{METRICS_EXTRACTION_INSTRUCTIONS}\n\n[CONTEXT DOCUMENT: {filename}]\n[TEXT_CONTENT]\n{text}")
}

pub fn verification_prompt(record_json: &str, source_text: &str) -> String {
    format!("{VERIFICATION_INSTRUCTIONS}\n\n[EXTRACTED JSON]\n{record_json}\n\n[SOURCE TEXT]\n{source_text}")
}

pub fn identification_prompt(preview: &str) -> String {
    format!("{IDENTIFICATION_INSTRUCTIONS}\n\nTEXT START:\n{preview}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_their_inputs() {
        let prompt = metrics_extraction_prompt("AR2024.pdf", "[Page 1]\nRevenue");
        assert!(prompt.contains("[CONTEXT DOCUMENT: AR2024.pdf]"));
        assert!(prompt.ends_with("[Page 1]\nRevenue"));

        let prompt = verification_prompt("{}", "source");
        assert!(prompt.contains("[EXTRACTED JSON]\n{}"));
        assert!(prompt.contains("[SOURCE TEXT]\nsource"));
    }
}
