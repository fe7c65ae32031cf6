//! Verification prompt for the generative path.
//!
//! The prompt is split into fixed sections and the claim list:
//! 1. Role and task framing
//! 2. The numbered claims of the request (dynamic)
//! 3. Verification logic, confidence bands and matching examples
//! 4. The exact JSON shape the response parser reads
//!
//! Field names in [`RESPONSE_FORMAT`] must stay in sync with the parser in
//! `claimcheck_core::response`.

use claimcheck_core::Claim;

/// Role and task framing.
pub const PREAMBLE: &str = r#"You are a strict image verification AI for NGO transparency audits.

TASK: Check if this image ACTUALLY shows the work described in the NGO claims below.

CRITICAL RULES:
"#;

/// Instruction used when the request asks for strict matching.
pub const STRICT_INSTRUCTION: &str = "Be EXTREMELY STRICT. Follow all rules strictly.";

/// Instruction used otherwise.
pub const LENIENT_INSTRUCTION: &str = "Follow the rules but be reasonable.";

/// Decision rules, confidence bands and matching examples.
pub const VERIFICATION_RULES: &str = r#"
3. **VERIFICATION LOGIC**:
   - If the image shows work related to ANY ONE claim above → VERIFIED (with that specific claim)
   - If the image shows partial/some evidence but not complete → PARTIALLY VERIFIED
   - If the image shows NOTHING related to the claims → NOT VERIFIED
   - If the image is a screenshot, logo, poster, AI-generated, or unrelated → NOT VERIFIED

4. **CONFIDENCE SCORING**:
   - 90-100%: Clear, obvious match - you can clearly see the claim's activity in the image
   - 70-89%: Good match but some uncertainty
   - 50-69%: Partial match or unclear
   - 0-49%: No match or unrelated

5. **STRICT MATCHING**: For "feeding people" → the image MUST show people being fed or food distribution. For "travel expense" → the image MUST show vehicles, transport, or evacuation. Generic NGO work is NOT enough.

ANALYSIS STEPS:

STEP 1: Look at the image. What do you ACTUALLY see?
- What objects are in the image?
- What actions are happening?
- What is the environment/setting?
- Are there people? What are they doing?

STEP 2: For EACH claim above, check:
- Does the image show activities mentioned in that claim?
- Can you see visual evidence supporting that specific claim?
- Is there a DIRECT, OBVIOUS match?

STEP 3: Make a decision:
- VERIFIED: Image clearly shows work from at least one claim above
- PARTIALLY VERIFIED: Image shows some but not complete evidence
- NOT VERIFIED: Image doesn't show any of the claimed work
"#;

/// Response contract read by the parser.
pub const RESPONSE_FORMAT: &str = r#"
RESPOND WITH THIS EXACT JSON FORMAT (no other text):

{
  "verification": "VERIFIED" | "PARTIALLY VERIFIED" | "NOT VERIFIED",
  "reason": "One clear sentence explaining why",
  "matchedCondition": "Exact claim title that matches, or null if none match",
  "confidence": 85,
  "whatIsInImage": "Brief exact description of what you see",
  "evidence": "Specific visual evidence that supports or contradicts the claim"
}

Now analyze the image against the claims above and return ONLY the JSON response:"#;

/// Prompt used when a request carries no usable claims.
pub const GENERIC_PROMPT: &str = "Does this image show legitimate NGO work activities?";

/// Render the numbered claim list.
///
/// Each claim becomes `N. Claim: "<title>"`, followed by an indented
/// `Description:` line when it has one. Blank titles are skipped without
/// consuming a number.
pub fn format_claims(claims: &[Claim]) -> String {
    claims
        .iter()
        .map(Claim::normalized)
        .filter(|c| !c.title.is_empty())
        .enumerate()
        .map(|(idx, claim)| match &claim.description {
            Some(description) => format!(
                "{}. Claim: \"{}\"\n   Description: {}",
                idx + 1,
                claim.title,
                description
            ),
            None => format!("{}. Claim: \"{}\"", idx + 1, claim.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full verification prompt for `claims`.
pub fn build_verification_prompt(claims: &[Claim], strict: bool) -> String {
    let claim_list = format_claims(claims);
    if claim_list.is_empty() {
        return GENERIC_PROMPT.to_string();
    }

    let instruction = if strict {
        STRICT_INSTRUCTION
    } else {
        LENIENT_INSTRUCTION
    };

    format!(
        "{}\n{}\n\n1. **VISUAL EVIDENCE REQUIRED**: The image MUST clearly show the specific activity described in the claim. Vague matches are NOT acceptable.\n\n2. **CHECK EACH CLAIM INDIVIDUALLY**:\n{}\n{}{}",
        PREAMBLE, instruction, claim_list, VERIFICATION_RULES, RESPONSE_FORMAT
    )
}
