/// Identifies one in-flight dataset fetch.
///
/// Small and copyable so the host can hand it back with the completion
/// without borrowing anything from the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(pub u64);

/// A fetch the host should perform: `GET {base}/mapData/{dataset_id}.geojson`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: FetchTicket,
    pub dataset_id: String,
}
