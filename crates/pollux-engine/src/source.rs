use pollux_types::{PropertyId, State};

/// Where the observations of a top-level threshold test come from.
///
/// The engine brackets each test with [`begin`](Self::begin) and
/// [`end`](Self::end) and pulls one observation per call to
/// [`next_observation`](Self::next_observation). `simulate` runs one local
/// path simulation; a source may call it, or return an observation produced
/// elsewhere for the same property.
///
/// `begin` names the state the paths start from. A source whose producers
/// simulate from one fixed state must answer runs from any other state with
/// `simulate`.
pub trait SampleSource {
    fn begin(&mut self, _property: PropertyId, _state: &State) {}

    fn next_observation(&mut self, simulate: &mut dyn FnMut() -> bool) -> bool;

    fn end(&mut self, _property: PropertyId) {}
}

/// Simulates every observation in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSampling;

impl SampleSource for LocalSampling {
    fn next_observation(&mut self, simulate: &mut dyn FnMut() -> bool) -> bool {
        simulate()
    }
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn begin(&mut self, property: PropertyId, state: &State) {
        (**self).begin(property, state);
    }

    fn next_observation(&mut self, simulate: &mut dyn FnMut() -> bool) -> bool {
        (**self).next_observation(simulate)
    }

    fn end(&mut self, property: PropertyId) {
        (**self).end(property);
    }
}
