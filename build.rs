use vergen::EmitBuilder;

fn main() {
    // 构建时间写入 VERGEN_BUILD_TIMESTAMP，供 --version 使用
    EmitBuilder::builder()
        .all_build()
        .emit()
        .expect("无法生成构建信息");
}
