//! Prompts and canned replies for the farming assistant chat.

pub const EMPTY_QUERY_REPLY: &str = "I didn't catch that. Could you repeat?";

pub const DISEASE_REDIRECT: &str =
    "I can help identify diseases using the 'Disease Detection' feature. Please upload a photo there.";

pub const FARMING_PROMPT: &str =
    "I am here to help with farming. Please ask specifically about your crops, like 'How to grow tomatoes'.";

pub const GREETING: &str =
    "I am KrishiMitra, your farming assistant. I can help with agriculture and plant diseases. Please ask me a question!";

pub const REFUSAL: &str = "I am KrishiMitra, an intelligent farming assistant. I can only answer questions related to agriculture, crops, and plant diseases. Please ask me something about farming.";

const LOCAL_PREFIX: &str = "Answer this question about farming: ";

/// Wraps a user query in the agriculture-only instruction sent to the cloud model.
pub fn cloud_prompt(query: &str) -> String {
    format!(
        "You are KrishiMitra, an AI assistant dedicated EXCLUSIVELY to agriculture.

YOUR MANDATE:
1. ANSWER only questions about:
   - Farming techniques, crop management, soil health.
   - Plant diseases, pests, and their organic/chemical cures.
   - Weather impacts on agriculture.
   - Tools and machinery for farming.

2. REFUSE immediately and politely if the user asks about:
   - Politics, entertainment, movies, sports.
   - General knowledge, history, math, coding (unless related to agri-tech).
   - Personal advice, medical advice (for humans).

3. REFUSAL FORMAT:
   \"{REFUSAL}\"

User Query: {query}
"
    )
}

pub fn local_prompt(query: &str) -> String {
    format!("{}{}", LOCAL_PREFIX, query)
}

/// Keyword reply used when no generative backend answered.
pub fn rule_based_reply(query: &str) -> &'static str {
    let query = query.to_lowercase();
    if query.contains("disease") {
        DISEASE_REDIRECT
    } else if ["farm", "crop", "plant"].iter().any(|k| query.contains(k)) {
        FARMING_PROMPT
    } else {
        GREETING
    }
}
