use state_machines::state_machine;

state_machine! {
    name: IngestionMachine,
    state: IngestionState,
    initial: Ready,
    states: [Ready, Loaded, Chunked, Extracted, Verified, Completed],
    events {
        load { transition: { from: Ready, to: Loaded } }
        chunk { transition: { from: Loaded, to: Chunked } }
        extract { transition: { from: Chunked, to: Extracted } }
        verify { transition: { from: Extracted, to: Verified } }
        complete { transition: { from: Verified, to: Completed } }
    }
}

pub fn ready() -> IngestionMachine<(), Ready> {
    IngestionMachine::new(())
}
