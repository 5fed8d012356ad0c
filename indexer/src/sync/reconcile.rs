use containers::Signature;
use std::collections::HashSet;

/// Splice a freshly scanned order onto the order retained from earlier cycles.
///
/// Both lists are newest first. When the retained head shows up in the new
/// scan at index `i`, the result is `new[..i] ++ previous`. When it does not,
/// the whole new scan goes in front of `previous`; this can put an older
/// signature ahead of newer ones but never drops one. Signatures already in
/// `previous` are never repeated.
pub fn reconcile(new: Vec<Signature>, previous: Vec<Signature>) -> Vec<Signature> {
    let Some(head) = previous.first() else {
        return new;
    };

    let prefix_len = new.iter().position(|sig| sig == head).unwrap_or(new.len());

    let retained: HashSet<&Signature> = previous.iter().collect();
    let mut emitted = HashSet::with_capacity(prefix_len);
    let mut combined = Vec::with_capacity(prefix_len + previous.len());
    for sig in &new[..prefix_len] {
        if !retained.contains(sig) && emitted.insert(sig) {
            combined.push(sig.clone());
        }
    }
    combined.extend(previous.iter().cloned());
    combined
}
