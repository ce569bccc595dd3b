//! Turn knowledge-base sources into chunked document records.
//!
//! Every source item is rendered to plain text, split with the shared
//! [`TextSplitter`], and each chunk becomes one record whose metadata names
//! the source type and the `item-chunk` position it came from.
use kbase_core::chunker::TextSplitter;
use kbase_core::loader::{display_value, Conversation, Faq, Feature, ProductCatalog};
use kbase_core::types::{DocumentRecord, Meta, MetaValue};

pub const DEFAULT_SECTION: &str = "Technical Documentation";

fn meta(pairs: &[(&str, &str)]) -> Meta {
    pairs.iter().map(|(k, v)| ((*k).to_string(), MetaValue::from(*v))).collect()
}

pub fn format_features(features: &[Feature]) -> String {
    if features.is_empty() {
        return "No features specified".to_string();
    }
    features
        .iter()
        .map(|f| {
            format!(
                "- {}: {}\n",
                f.name.as_deref().unwrap_or("Unnamed Feature"),
                f.description.as_deref().unwrap_or("No description available")
            )
        })
        .collect()
}

pub fn format_list(items: &[String]) -> String {
    if items.is_empty() {
        return "None specified".to_string();
    }
    items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

/// Products, add-ons, bundles and FAQ answers, in that order.
pub fn product_records(catalog: &ProductCatalog, faqs: &Faq, splitter: &TextSplitter) -> Vec<DocumentRecord> {
    let mut out = Vec::new();

    for (i, product) in catalog.products.iter().enumerate() {
        let text = format!(
            "Product: {name}\nID: {id}\nDescription: {description}\n\n\
             Price:\nMonthly: ${monthly}\nAnnual: ${annual}\n\n\
             Features:\n{features}\n\n\
             Limitations:\n{limitations}\n\n\
             Target Audience: {audience}\n",
            name = product.name,
            id = product.id,
            description = product.description,
            monthly = display_value(product.price.monthly.as_ref()),
            annual = display_value(product.price.annual.as_ref()),
            features = format_features(&product.features),
            limitations = format_list(&product.limitations),
            audience = product.target_audience.as_deref().unwrap_or("Not specified"),
        );
        for (j, chunk) in splitter.split_text(&text).into_iter().enumerate() {
            let m = meta(&[
                ("type", "product"),
                ("product_id", product.id.as_str()),
                ("product_name", product.name.as_str()),
                ("chunk", format!("{i}-{j}").as_str()),
            ]);
            out.push(DocumentRecord::new(chunk, m, format!("product-{}-{j}", product.id)));
        }
    }

    for (i, addon) in catalog.addons.iter().enumerate() {
        let text = format!(
            "Add-on: {name}\nID: {id}\nDescription: {description}\n\n\
             Price: ${price}\n\n\
             Details: {details}\n",
            name = addon.name,
            id = addon.id,
            description = addon.description,
            price = display_value(addon.price.as_ref()),
            details = addon.details.as_deref().unwrap_or("No additional details"),
        );
        for (j, chunk) in splitter.split_text(&text).into_iter().enumerate() {
            let m = meta(&[
                ("type", "addon"),
                ("addon_id", addon.id.as_str()),
                ("addon_name", addon.name.as_str()),
                ("chunk", format!("{i}-{j}").as_str()),
            ]);
            out.push(DocumentRecord::new(chunk, m, format!("addon-{}-{j}", addon.id)));
        }
    }

    for (i, bundle) in catalog.bundles.iter().enumerate() {
        let text = format!(
            "Bundle: {name}\nID: {id}\nDescription: {description}\n\n\
             Included Products: {included}\n\n\
             Price:\nMonthly: ${monthly}\nAnnual: ${annual}\nSavings: {savings}%\n",
            name = bundle.name,
            id = bundle.id,
            description = bundle.description,
            included = bundle.included_products.join(", "),
            monthly = display_value(bundle.price.monthly.as_ref()),
            annual = display_value(bundle.price.annual.as_ref()),
            savings = display_value(bundle.price.saving_percentage.as_ref()),
        );
        for (j, chunk) in splitter.split_text(&text).into_iter().enumerate() {
            let m = meta(&[
                ("type", "bundle"),
                ("bundle_id", bundle.id.as_str()),
                ("bundle_name", bundle.name.as_str()),
                ("chunk", format!("{i}-{j}").as_str()),
            ]);
            out.push(DocumentRecord::new(chunk, m, format!("bundle-{}-{j}", bundle.id)));
        }
    }

    for (i, category) in faqs.categories.iter().enumerate() {
        for (j, entry) in category.questions.iter().enumerate() {
            let text = format!(
                "Category: {}\nQuestion: {}\nAnswer: {}\n",
                category.name, entry.question, entry.answer
            );
            for (k, chunk) in splitter.split_text(&text).into_iter().enumerate() {
                let m = meta(&[("type", "faq"), ("category", category.name.as_str()), ("chunk", format!("{i}-{j}-{k}").as_str())]);
                out.push(DocumentRecord::new(chunk, m, format!("faq-{i}-{j}-{k}")));
            }
        }
    }

    out
}

/// Title for a documentation chunk: its first `##` heading, otherwise the
/// last `#` heading before that, otherwise [`DEFAULT_SECTION`].
pub fn section_title(chunk: &str) -> String {
    let strip = |line: &str| line.trim_matches(|c: char| c == '#' || c == ' ').to_string();
    let mut title = DEFAULT_SECTION.to_string();
    for line in chunk.lines() {
        if line.starts_with("##") {
            return strip(line);
        }
        if line.starts_with('#') {
            title = strip(line);
        }
    }
    title
}

pub fn technical_records(tech_docs: &str, splitter: &TextSplitter) -> Vec<DocumentRecord> {
    splitter
        .split_text(tech_docs)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let m = meta(&[("type", "technical_doc"), ("section", section_title(&chunk).as_str()), ("chunk", i.to_string().as_str())]);
            DocumentRecord::new(chunk, m, format!("tech-{i}"))
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn conversation_text(conversation: &Conversation) -> String {
    let mut text = format!(
        "Conversation ID: {}\nCustomer: {}\nAgent: {}\n\n",
        conversation.conversation_id, conversation.customer_email, conversation.agent_name
    );
    for message in &conversation.messages {
        text.push_str(&format!("{}: {}\n\n", capitalize(&message.role), message.content));
    }
    text
}

pub fn conversation_records(conversations: &[Conversation], splitter: &TextSplitter) -> Vec<DocumentRecord> {
    let mut out = Vec::new();
    for (i, conversation) in conversations.iter().enumerate() {
        for (j, chunk) in splitter.split_text(&conversation_text(conversation)).into_iter().enumerate() {
            let m = meta(&[
                ("type", "conversation"),
                ("conversation_id", conversation.conversation_id.as_str()),
                ("customer_email", conversation.customer_email.as_str()),
                ("agent_name", conversation.agent_name.as_str()),
                ("chunk", format!("{i}-{j}").as_str()),
            ]);
            out.push(DocumentRecord::new(chunk, m, format!("conv-{}-{j}", conversation.conversation_id)));
        }
    }
    out
}
