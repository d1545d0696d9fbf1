//! Helpers shared by the built-in input modules.

use lector_core::{load_embeddings, tokenize};
use lector_abstraction::{
    ReaderResult, SharedResources, TrainingInstance, UNK_ID, Vocab,
};

pub(crate) fn norm_token(token: &str, lowercase: bool) -> String {
    if lowercase { token.to_lowercase() } else { token.to_string() }
}

/// Token ids of `text` under the (possibly frozen) vocabulary.
pub(crate) fn text_ids(vocab: &Vocab, text: &str, lowercase: bool) -> Vec<u32> {
    tokenize(text)
        .iter()
        .map(|t| vocab.get(&norm_token(&t.text, lowercase)).unwrap_or(UNK_ID))
        .collect()
}

/// Initializes the token vocabulary: from a pretrained embedding table
/// when the config names one, otherwise from the training data. The
/// vocabulary is frozen either way.
pub(crate) fn init_token_vocab(
    shared: &mut SharedResources,
    data: &[TrainingInstance],
    lowercase: bool,
) -> ReaderResult<()> {
    if let Some(path) = shared.config.get_path("embedding_file") {
        let format = shared.config.get_str("embedding_format").unwrap_or("glove").parse()?;
        shared.vocab = load_embeddings(&path, format)?.into_vocab();
        return Ok(());
    }

    let mut vocab = Vocab::new();
    for instance in data {
        for token in tokenize(&instance.setting.question) {
            vocab.observe(&norm_token(&token.text, lowercase));
        }
        for doc in &instance.setting.support {
            for token in tokenize(doc) {
                vocab.observe(&norm_token(&token.text, lowercase));
            }
        }
    }
    vocab.freeze();
    shared.vocab = vocab;
    Ok(())
}
