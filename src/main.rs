fn main() {
    lantern_gpu::run();
}
