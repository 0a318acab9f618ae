use std::time::Duration;

use result_ai::providers::openai::{
    self, ChatCompletion, ChatCompletionRequest, ChatMessage, Choice, Usage,
};
use result_ai::TaskContext;

// Stand-in backend so the demo runs offline.
fn canned_backend(request: ChatCompletionRequest) -> Result<ChatCompletion, openai::OpenAiError> {
    let prompt = request
        .messages
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default();
    let reply = format!("(canned) you said: {}", prompt);
    let prompt_tokens = prompt.split_whitespace().count() as u32;
    let completion_tokens = reply.split_whitespace().count() as u32;

    Ok(ChatCompletion {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        model: request.model,
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::assistant(reply),
            finish_reason: Some("stop".to_string()),
        }],
        usage: Some(Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }),
    })
}

fn ask(system: &str, user: &str) -> anyhow::Result<String> {
    let request = ChatCompletionRequest::new(
        "gpt-3.5-turbo",
        vec![ChatMessage::system(system), ChatMessage::user(user)],
    );
    let completion = openai::create(request)?;
    Ok(completion.first_content().unwrap_or_default().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    result_ai::logging::init();
    tracing::info!("result-ai demo starting");

    openai::bind("1.30.0", canned_backend)?;

    println!("Example 1: call without monitoring");
    println!("Response: {}", ask("You are a helpful assistant.", "Hello, world!")?);

    println!("Example 2: monitored call");
    let context = TaskContext::new("joke_task").with_metadata("category", "humor");
    let mut scope = result_ai::monitor_with(context);
    let reply = scope.run_fallible(|| ask("You are a helpful assistant.", "Tell me a joke."))?;
    println!("Response: {}", reply);

    println!("Example 3: detailed metadata with a template");
    let context = TaskContext::new("classification_task")
        .with_metadata("text", "I love this product!")
        .with_metadata("environment", "development")
        .with_template("Classify this text as positive or negative: '{text}' ({environment})");
    let mut scope = result_ai::monitor_with(context);
    let reply = scope.run_fallible(|| {
        ask(
            "You are a sentiment analysis assistant.",
            "Classify this text as positive or negative: 'I love this product!'",
        )
    })?;
    println!("Response: {}", reply);

    println!("Example 4: several calls in one scope");
    let context = TaskContext::new("conversation_task").with_metadata("session_id", "session123");
    let mut scope = result_ai::monitor_with(context);
    {
        let _active = scope.enter();
        let first = ask("You are a helpful assistant.", "Hello, how are you?")?;
        println!("First response: {}", first);
        let second = ask("You are a helpful assistant.", "What can you help me with today?")?;
        println!("Second response: {}", second);
    }

    println!("Example 5: after the scope, calls are no longer recorded");
    println!("Response: {}", ask("You are a helpful assistant.", "What's the weather like?")?);

    // Give the background worker a chance to flush before the process exits.
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
