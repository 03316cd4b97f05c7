use fitchat_contracts::session::TaskKind;

const FOOD_ANALYSIS_PROMPT: &str = "Analyze this meal photo and provide:
1. List of visible food items
2. Estimated total calories
3. Macronutrient breakdown (protein, carbs, fats)
4. Nutritional advice
Keep the response concise and focused.";

const EQUIPMENT_ANALYSIS_PROMPT: &str = "Analyze this gym equipment photo and provide:
1. Equipment name and type
2. Primary purpose
3. Target muscle groups
4. Usage instructions
5. Alternative exercises
Keep the response concise and focused.";

pub const CHAT_SAFETY_CATEGORY: &str = "HARM_CATEGORY_HARASSMENT";
pub const CHAT_SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

pub fn analysis_prompt(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Food => FOOD_ANALYSIS_PROMPT,
        TaskKind::Equipment => EQUIPMENT_ANALYSIS_PROMPT,
    }
}

pub fn chat_prompt(user_text: &str) -> String {
    format!(
        "As an AI fitness trainer and nutritionist, please respond to: {user_text}\n\
         Provide specific, actionable advice related to fitness, nutrition, or health."
    )
}
