//! Label generation: `AdjectiveAnimal0000`.

use rand::Rng;

/// Redraws attempted when a fresh label is already registered. After the
/// last redraw the colliding label is accepted rather than looping
/// forever; labels are pseudonyms, not unique identifiers.
pub const LABEL_COLLISION_RETRIES: usize = 10;

pub(crate) const ADJECTIVES: &[&str] = &[
    "Agile", "Amber", "Bold", "Brave", "Bright", "Brisk", "Calm", "Candid",
    "Cedar", "Civic", "Clever", "Cobalt", "Cosmic", "Crimson", "Curious", "Dapper",
    "Deft", "Eager", "Fabled", "Fleet", "Gentle", "Gilded", "Golden", "Hardy",
    "Hazel", "Humble", "Indigo", "Jolly", "Keen", "Lively", "Lucid", "Lunar",
    "Mellow", "Merry", "Mighty", "Nimble", "Noble", "Opal", "Patient", "Placid",
    "Plucky", "Quiet", "Rustic", "Serene", "Silver", "Sunny", "Swift", "Witty",
];

pub(crate) const ANIMALS: &[&str] = &[
    "Alpaca", "Badger", "Beaver", "Bison", "Caribou", "Condor", "Dingo", "Dormouse",
    "Egret", "Falcon", "Ferret", "Gecko", "Heron", "Ibex", "Iguana", "Jackal",
    "Jaguar", "Kestrel", "Koala", "Lemur", "Llama", "Lynx", "Magpie", "Marmot",
    "Marten", "Narwhal", "Newt", "Ocelot", "Osprey", "Otter", "Panther", "Petrel",
    "Plover", "Puffin", "Quail", "Quokka", "Raven", "Seal", "Stoat", "Tapir",
    "Tern", "Toucan", "Vole", "Walrus", "Wombat", "Wren", "Yak", "Zebra",
];

/// Outcome of a uniqueness-checked draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedLabel {
    pub label: String,
    /// True when the retry budget ran out and a registered label was
    /// accepted anyway.
    pub collided: bool,
}

/// Draws one label uniformly from the adjective and animal lists plus a
/// four-digit numeral.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let animal = ANIMALS[rng.gen_range(0..ANIMALS.len())];
    let numeral: u16 = rng.gen_range(0..10_000);
    format!("{adjective}{animal}{numeral:04}")
}

/// Draws a label not currently registered, redrawing up to
/// [`LABEL_COLLISION_RETRIES`] times before accepting a collision.
pub fn generate_unique<R, F>(rng: &mut R, is_taken: F) -> GeneratedLabel
where
    R: Rng + ?Sized,
    F: Fn(&str) -> bool,
{
    let mut label = generate(rng);
    for _ in 0..LABEL_COLLISION_RETRIES {
        if !is_taken(&label) {
            return GeneratedLabel {
                label,
                collided: false,
            };
        }
        label = generate(rng);
    }
    let collided = is_taken(&label);
    GeneratedLabel { label, collided }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn assert_well_formed(label: &str) {
        let digits = &label[label.len() - 4..];
        assert!(
            digits.bytes().all(|b| b.is_ascii_digit()),
            "label {label} should end in four digits"
        );
        let words = &label[..label.len() - 4];
        let adjective = ADJECTIVES
            .iter()
            .find(|a| words.starts_with(*a) && ANIMALS.contains(&&words[a.len()..]));
        assert!(
            adjective.is_some(),
            "label {label} should split into known adjective + animal"
        );
    }

    #[test]
    fn generated_labels_are_well_formed() {
        for seed in 0..100u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_well_formed(&generate(&mut rng));
        }
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let a = generate(&mut StdRng::seed_from_u64(7));
        let b = generate(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn free_label_returned_without_redraw() {
        let draws = Cell::new(0usize);
        let mut rng = StdRng::seed_from_u64(1);
        let generated = generate_unique(&mut rng, |_| {
            draws.set(draws.get() + 1);
            false
        });
        assert!(!generated.collided);
        assert_eq!(draws.get(), 1);
    }

    #[test]
    fn redraws_until_a_free_label_appears() {
        let mut rng = StdRng::seed_from_u64(2);
        let first = generate(&mut StdRng::seed_from_u64(2));
        let generated = generate_unique(&mut rng, |candidate| candidate == first);
        assert!(!generated.collided);
        assert_ne!(generated.label, first);
    }

    #[test]
    fn exhausted_retries_accept_the_collision() {
        let draws = Cell::new(0usize);
        let mut rng = StdRng::seed_from_u64(3);
        let generated = generate_unique(&mut rng, |_| {
            draws.set(draws.get() + 1);
            true
        });
        assert!(generated.collided);
        // One check per retry plus the final acceptance check.
        assert_eq!(draws.get(), LABEL_COLLISION_RETRIES + 1);
        assert_well_formed(&generated.label);
    }
}
